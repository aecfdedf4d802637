// @generated by buildchain. Do not edit.

///Every build provider generated for this crate.
#[allow(unused_mut)]
pub fn build_providers() -> ::buildchain::ProviderRegistry {
    let mut registry = ::buildchain::ProviderRegistry::new();
    registry
        .register(
            ::std::boxed::Box::new(
                <crate::web::WebStepsBuildProvider as ::std::default::Default>::default(),
            ),
        );
    registry
}
