//! Adds gunicorn to the installed dependencies of applications that don't configure an
//! entrypoint.
//!
//! The buildpack only contributes a requirements file, installing it is left to the pip or uv
//! buildpack.

use crate::dependencies::contains_package;
use crate::manifest::REQUIREMENTS_TXT;
use libbuildpack::config::env;
use libbuildpack::data::build_plan::BuildPlanBuilder;
use libbuildpack::data::layer_content_metadata::LayerTypes;
use libbuildpack::detect::{DetectResult, DetectResultBuilder};
use libbuildpack::layer_env::{Scope, PATH_LIST_SEPARATOR};
use libbuildpack::{Context, Result};

pub const LAYER_NAME: &str = "gunicorn";

pub fn detect(context: &Context) -> Result<DetectResult> {
    if context.env_var(env::ENTRYPOINT).is_some() {
        return Ok(DetectResultBuilder::fail("custom entrypoint present").build());
    }

    let reason = if context.file_exists(REQUIREMENTS_TXT) {
        let requirements = context
            .read_file(REQUIREMENTS_TXT)
            .map_err(|error| error.wrap("error detecting gunicorn"))?;
        if contains_package(&requirements, "gunicorn")? {
            return Ok(DetectResultBuilder::fail("gunicorn present in requirements.txt").build());
        }
        "gunicorn missing from requirements.txt"
    } else {
        "requirements.txt with gunicorn not found"
    };

    Ok(DetectResultBuilder::pass(reason)
        .build_plan(BuildPlanBuilder::new().provides(REQUIREMENTS_TXT).build())
        .build())
}

pub fn build(context: &mut Context) -> Result<()> {
    let mut layer = context.layer(LAYER_NAME, LayerTypes::build())?;

    context.debug("Adding webserver requirements.txt to the list of requirements files to install.");
    let requirements = context.buildpack_dir().join(REQUIREMENTS_TXT);
    tracing::debug!(requirements = %requirements.display(), "contributing requirements file");
    layer.env_mut().append_with_delimiter(
        Scope::Build,
        env::INTERNAL_REQUIREMENTS_FILES,
        requirements,
        PATH_LIST_SEPARATOR,
    );

    context.write_layer(&layer)
}

#[cfg(test)]
mod tests {
    use super::{build, detect};
    use indoc::indoc;
    use libbuildpack::data::layer_content_metadata::LayerTypes;
    use libbuildpack::layer_env::Scope;
    use libbuildpack::testing::TestContextBuilder;
    use libbuildpack::Env;

    #[test]
    fn custom_entrypoint_opts_out() {
        let test = TestContextBuilder::new()
            .env("GOOGLE_ENTRYPOINT", "gunicorn -b :8080 main:app")
            .build();

        let result = detect(&test.context).unwrap();

        assert!(!result.passed());
        assert_eq!(result.reason(), "custom entrypoint present");
    }

    #[test]
    fn declared_gunicorn_opts_out() {
        for requirements in [
            "gunicorn\n",
            "flask\ngunicorn==23.0.0\n",
            "git+https://github.com/benoitc/gunicorn.git#egg=gunicorn\n",
        ] {
            let test = TestContextBuilder::new()
                .file("requirements.txt", requirements)
                .build();

            let result = detect(&test.context).unwrap();

            assert!(!result.passed(), "{requirements}");
            assert_eq!(result.reason(), "gunicorn present in requirements.txt");
        }
    }

    #[test]
    fn gunicorn_extensions_dont_count() {
        let test = TestContextBuilder::new()
            .file(
                "requirements.txt",
                indoc! {"
                    flask
                    gunicorn-color
                "},
            )
            .build();

        let result = detect(&test.context).unwrap();

        assert!(result.passed());
        assert_eq!(result.reason(), "gunicorn missing from requirements.txt");
        assert!(result
            .build_plan()
            .unwrap()
            .provides_name("requirements.txt"));
    }

    #[test]
    fn missing_requirements_opts_in() {
        let test = TestContextBuilder::new().file("main.py", "").build();

        let result = detect(&test.context).unwrap();

        assert!(result.passed());
        assert_eq!(result.reason(), "requirements.txt with gunicorn not found");
        assert!(!result
            .build_plan()
            .unwrap()
            .requires_name("requirements.txt"));
    }

    #[test]
    fn build_contributes_requirements_file() {
        let mut test = TestContextBuilder::new()
            .buildpack_file("requirements.txt", "gunicorn==23.0.0\n")
            .build();

        build(&mut test.context).unwrap();

        let layer = test
            .context
            .layer("gunicorn", LayerTypes::build())
            .unwrap();
        let requirements = test.buildpack_dir().join("requirements.txt");

        let mut env = Env::new();
        env.insert(
            "GOOGLE_INTERNAL_REQUIREMENTS_FILES",
            "/layers/google.python.runtime/requirements.txt",
        );
        assert_eq!(
            layer
                .env()
                .apply(Scope::Build, &env)
                .get_string_lossy("GOOGLE_INTERNAL_REQUIREMENTS_FILES"),
            Some(format!(
                "/layers/google.python.runtime/requirements.txt:{}",
                requirements.display()
            ))
        );
        assert!(layer
            .env()
            .apply_to_empty(Scope::Launch)
            .get_string_lossy("GOOGLE_INTERNAL_REQUIREMENTS_FILES")
            .is_none());
    }
}
