// @generated by buildchain. Do not edit.

///Registers the build steps of this module's step owner.
#[derive(Debug, Default, Clone, Copy)]
pub struct WebStepsBuildProvider;
impl ::buildchain::BuildProvider for WebStepsBuildProvider {
    fn name(&self) -> &str {
        "crate::web::WebStepsBuildProvider"
    }
    fn install_into(
        &self,
        builder: &mut ::buildchain::BuildChainBuilder,
    ) -> ::std::result::Result<(), ::buildchain::ChainBuildError> {
        let owner = ::std::sync::Arc::new(<WebSteps as ::std::default::Default>::default());
        builder
            .add_build_step(WebStepsHealthRouteBuildStep {
                owner: ::std::sync::Arc::clone(&owner),
            })
            .consumes::<AppConfig>()
            .produces::<Route>()
            .build()?;
        builder
            .add_build_step(WebStepsMetricsRouteBuildStep {
                owner: ::std::sync::Arc::clone(&owner),
            })
            .produces::<Route>()
            .build()?;
        builder
            .add_build_step(WebStepsRouterBuildStep {
                owner: ::std::sync::Arc::clone(&owner),
            })
            .consumes::<Route>()
            .consumes_optional::<Banner>()
            .produces::<Router>()
            .provides_capability("web")
            .build()?;
        builder
            .add_build_step(WebStepsServeBuildStep {
                owner: ::std::sync::Arc::clone(&owner),
            })
            .consumes::<Router>()
            .recording(::buildchain::ExecutionTime::StaticInit)
            .build()?;
        builder
            .add_build_step(WebStepsMatchBuildStep {
                owner: ::std::sync::Arc::clone(&owner),
            })
            .consumes::<Router>()
            .produces::<RouteCount>()
            .build()?;
        Ok(())
    }
}
struct WebStepsHealthRouteBuildStep {
    owner: ::std::sync::Arc<WebSteps>,
}
impl ::buildchain::BuildStep for WebStepsHealthRouteBuildStep {
    fn id(&self) -> ::std::string::String {
        "web::WebSteps::health_route".to_string()
    }
    #[allow(unused_variables, unused_mut)]
    fn execute(
        &self,
        ctx: &mut ::buildchain::BuildContext<'_>,
    ) -> ::buildchain::anyhow::Result<()> {
        let arg0 = ctx.consume::<AppConfig>()?;
        let mut arg1 = ::buildchain::BuildProducer::<Route>::new();
        self.owner.health_route(&arg0, &mut arg1);
        ctx.produce_all(arg1.into_items())?;
        Ok(())
    }
}
struct WebStepsMetricsRouteBuildStep {
    owner: ::std::sync::Arc<WebSteps>,
}
impl ::buildchain::BuildStep for WebStepsMetricsRouteBuildStep {
    fn id(&self) -> ::std::string::String {
        "web::WebSteps::metrics_route".to_string()
    }
    #[allow(unused_variables, unused_mut)]
    fn execute(
        &self,
        ctx: &mut ::buildchain::BuildContext<'_>,
    ) -> ::buildchain::anyhow::Result<()> {
        let output = self.owner.metrics_route();
        ctx.produce_all(output)?;
        Ok(())
    }
}
struct WebStepsRouterBuildStep {
    owner: ::std::sync::Arc<WebSteps>,
}
impl ::buildchain::BuildStep for WebStepsRouterBuildStep {
    fn id(&self) -> ::std::string::String {
        "web::WebSteps::router".to_string()
    }
    #[allow(unused_variables, unused_mut)]
    fn execute(
        &self,
        ctx: &mut ::buildchain::BuildContext<'_>,
    ) -> ::buildchain::anyhow::Result<()> {
        let arg0 = ctx.consume_multi::<Route>()?;
        let arg1 = ctx.consume_optional::<Banner>()?;
        let output = self.owner.router(arg0, arg1.as_deref())?;
        ctx.produce(output)?;
        Ok(())
    }
}
struct WebStepsServeBuildStep {
    owner: ::std::sync::Arc<WebSteps>,
}
impl ::buildchain::BuildStep for WebStepsServeBuildStep {
    fn id(&self) -> ::std::string::String {
        "web::WebSteps::serve".to_string()
    }
    #[allow(unused_variables, unused_mut)]
    fn execute(
        &self,
        ctx: &mut ::buildchain::BuildContext<'_>,
    ) -> ::buildchain::anyhow::Result<()> {
        let arg1 = ctx.consume::<Router>()?;
        let arg0 = ctx.recorder()?;
        self.owner.serve(arg0, arg1);
        Ok(())
    }
}
struct WebStepsMatchBuildStep {
    owner: ::std::sync::Arc<WebSteps>,
}
impl ::buildchain::BuildStep for WebStepsMatchBuildStep {
    fn id(&self) -> ::std::string::String {
        "web::WebSteps::match".to_string()
    }
    #[allow(unused_variables, unused_mut)]
    fn execute(
        &self,
        ctx: &mut ::buildchain::BuildContext<'_>,
    ) -> ::buildchain::anyhow::Result<()> {
        let arg0 = ctx.consume::<Router>()?;
        if let Some(output) = self.owner.r#match(&arg0) {
            ctx.produce(output)?;
        }
        Ok(())
    }
}
