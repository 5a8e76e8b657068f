//! Installs dependencies of Poetry projects. Only available on alpha release tracks.

use crate::install::poetry::{ensure_poetry_lockfile, install_poetry, poetry_install};
use crate::package_manager::{detect_package_manager, PackageManager};
use libbuildpack::context::ExecOptions;
use libbuildpack::data::layer_content_metadata::LayerTypes;
use libbuildpack::detect::{DetectResult, DetectResultBuilder};
use libbuildpack::metrics::MetricId;
use libbuildpack::{Context, Result};

pub const LAYER_NAME: &str = "poetry-dependencies";

pub fn detect(context: &Context) -> Result<DetectResult> {
    if !context.feature_gates().poetry {
        return Ok(DetectResultBuilder::fail(
            "Python Poetry Buildpack is only supported in ALPHA release tracks.",
        )
        .build());
    }

    let detection = detect_package_manager(context)?;
    Ok(match detection.package_manager {
        Some(PackageManager::Poetry) => DetectResultBuilder::pass(detection.reason).build(),
        Some(package_manager) => DetectResultBuilder::fail(format!(
            "{}, dependencies are installed with {package_manager}",
            detection.reason
        ))
        .build(),
        None => DetectResultBuilder::fail(detection.reason).build(),
    })
}

pub fn build(context: &mut Context) -> Result<()> {
    context.metrics().counter(MetricId::PoetryUsage).increment(1);
    install_poetry(context).map_err(|error| error.wrap("installing poetry"))?;
    ensure_poetry_lockfile(context).map_err(|error| error.wrap("ensuring poetry.lock"))?;

    let mut layer = context.layer(LAYER_NAME, LayerTypes::all())?;
    let venv_dir = poetry_install(context, &mut layer)
        .map_err(|error| error.wrap("installing dependencies and configuring env"))?;
    tracing::info!(venv = %venv_dir.display(), "installed dependencies with poetry");
    context.write_layer(&layer)?;

    match context.exec(["poetry", "check"], &ExecOptions::new().user_attribution()) {
        Ok(_) => context.debug("No incompatible dependencies found."),
        Err(error) => context.log(format!(
            "Warning: 'poetry check' returned an error, which might just be a deprecation warning: {error}"
        )),
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::{build, detect};
    use indoc::indoc;
    use libbuildpack::metrics::MetricId;
    use libbuildpack::testing::{ScriptedRunner, TestContextBuilder};

    const PYPROJECT: &str = indoc! {r#"
        [tool.poetry]
        name = "app"

        [tool.poetry.dependencies]
        python = "^3.13"
        flask = "^3.1"
    "#};

    #[test]
    fn detect_needs_alpha_track() {
        let test = TestContextBuilder::new()
            .file("pyproject.toml", PYPROJECT)
            .file("poetry.lock", "")
            .build();

        let result = detect(&test.context).unwrap();

        assert!(!result.passed());
        assert_eq!(
            result.reason(),
            "Python Poetry Buildpack is only supported in ALPHA release tracks."
        );
    }

    #[test]
    fn detect_poetry_project() {
        let test = TestContextBuilder::new()
            .file("pyproject.toml", PYPROJECT)
            .env("X_GOOGLE_RELEASE_TRACK", "ALPHA")
            .build();

        let result = detect(&test.context).unwrap();

        assert!(result.passed());
        assert_eq!(result.reason(), "found [tool.poetry] in pyproject.toml");
    }

    #[test]
    fn detect_ignores_requirements_applications() {
        let test = TestContextBuilder::new()
            .file("requirements.txt", "flask\n")
            .env("X_GOOGLE_RELEASE_TRACK", "ALPHA")
            .build();

        assert!(!detect(&test.context).unwrap().passed());
    }

    #[test]
    fn build_installs_dependencies() {
        let mut test = TestContextBuilder::new()
            .file("pyproject.toml", PYPROJECT)
            .file("poetry.lock", "# locked\n")
            .runner(
                ScriptedRunner::new()
                    .stdout("python3 --version", "Python 3.13.1")
                    .stdout("poetry env info --path", "/layers/poetry-dependencies/app-py3.13"),
            )
            .build();

        build(&mut test.context).unwrap();

        assert_eq!(test.metrics.counter(MetricId::PoetryUsage).value(), 1);
        assert!(test.runner.ran("poetry install"));
        assert!(test.runner.ran("poetry check"));
        assert!(test.layers_dir().join("poetry-dependencies.toml").exists());
    }

    #[test]
    fn failing_poetry_check_is_not_fatal() {
        let mut test = TestContextBuilder::new()
            .file("pyproject.toml", PYPROJECT)
            .file("poetry.lock", "# locked\n")
            .runner(
                ScriptedRunner::new()
                    .stdout("python3 --version", "Python 3.13.1")
                    .stdout("poetry env info --path", "/layers/poetry-dependencies/app-py3.13")
                    .failure("poetry check", 1, "The \"poetry.dev-dependencies\" section is deprecated"),
            )
            .build();

        build(&mut test.context).unwrap();
    }
}
