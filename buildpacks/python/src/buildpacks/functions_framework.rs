//! Runs Python functions with the functions framework.
//!
//! Functions that don't declare `functions-framework` in `requirements.txt` get the framework
//! through a requirements file of this buildpack, installed by the pip or uv buildpack.

use super::requirements_plan;
use crate::dependencies::contains_package;
use crate::manifest::REQUIREMENTS_TXT;
use libbuildpack::config::{env, parse_bool};
use libbuildpack::context::ExecOptions;
use libbuildpack::data::launch::{ProcessBuilder, ProcessType};
use libbuildpack::data::layer_content_metadata::LayerTypes;
use libbuildpack::detect::{DetectResult, DetectResultBuilder};
use libbuildpack::layer::Layer;
use libbuildpack::layer_env::{ModificationBehavior, Scope, PATH_LIST_SEPARATOR};
use libbuildpack::{BuildpackError, Context, Result};

pub const LAYER_NAME: &str = "functions-framework";
const FRAMEWORK: &str = "functions-framework";
const DEFAULT_SOURCE: &str = "main.py";

pub fn detect(context: &Context) -> Result<DetectResult> {
    let variable = env::FUNCTION_TARGET;
    Ok(if context.env_var(variable).is_some() {
        DetectResultBuilder::pass(format!("{variable} set"))
            .build_plan(requirements_plan(true))
            .build()
    } else {
        DetectResultBuilder::fail(format!("{variable} not set")).build()
    })
}

pub fn build(context: &mut Context) -> Result<()> {
    validate_source(context)?;

    // Syntax errors in the function surface here instead of on the first request.
    context.exec(
        ["python3", "-m", "compileall", "-f", "-q", "."],
        &ExecOptions::new().user_attribution(),
    )?;

    let declared = framework_declared(context)
        .map_err(|error| error.wrap("checking for functions-framework"))?;
    let mut layer = context.layer(LAYER_NAME, LayerTypes::build().launch())?;

    if declared {
        context.log("Handling functions with dependency on functions-framework.");
        context.clear_layer(&mut layer)?;
    } else {
        context.log("Handling functions without dependency on functions-framework.");
        ensure_injection_allowed(context)?;

        context.debug(
            "Adding functions-framework requirements.txt to the list of requirements files to install.",
        );
        let requirements = context.buildpack_dir().join("converter").join(REQUIREMENTS_TXT);
        tracing::debug!(requirements = %requirements.display(), "contributing requirements file");
        layer.env_mut().append_with_delimiter(
            Scope::Build,
            env::INTERNAL_REQUIREMENTS_FILES,
            requirements,
            PATH_LIST_SEPARATOR,
        );
    }

    set_function_env(context, &mut layer);
    context.write_layer(&layer)?;

    let web = "web"
        .parse::<ProcessType>()
        .map_err(|error| BuildpackError::internal(error.to_string()))?;
    context.add_process(ProcessBuilder::new(web, [FRAMEWORK]).default(true).build());

    Ok(())
}

fn validate_source(context: &Context) -> Result<()> {
    match context.env_var(env::FUNCTION_SOURCE) {
        None if !context.file_exists(DEFAULT_SOURCE) => Err(BuildpackError::user(format!(
            "missing {DEFAULT_SOURCE} and {} not specified. Either create the function in \
             {DEFAULT_SOURCE} or specify {} to point to the file that contains the function",
            env::FUNCTION_SOURCE,
            env::FUNCTION_SOURCE
        ))),
        Some(source) if !context.file_exists(&source) => Err(BuildpackError::user(format!(
            "{} specified file {source:?} but it does not exist",
            env::FUNCTION_SOURCE
        ))),
        _ => Ok(()),
    }
}

fn framework_declared(context: &Context) -> Result<bool> {
    if !context.file_exists(REQUIREMENTS_TXT) {
        return Ok(false);
    }
    contains_package(&context.read_file(REQUIREMENTS_TXT)?, FRAMEWORK)
}

fn ensure_injection_allowed(context: &Context) -> Result<()> {
    let Some(value) = context.env_var(env::SKIP_FRAMEWORK_INJECTION) else {
        return Ok(());
    };
    if parse_bool(env::SKIP_FRAMEWORK_INJECTION, &value)
        .map_err(|error| BuildpackError::user(error.to_string()))?
    {
        return Err(BuildpackError::user(format!(
            "{} is set but {FRAMEWORK} is missing from {REQUIREMENTS_TXT}. \
             Add {FRAMEWORK} to {REQUIREMENTS_TXT} or unset {}",
            env::SKIP_FRAMEWORK_INJECTION,
            env::SKIP_FRAMEWORK_INJECTION
        )));
    }
    Ok(())
}

/// Passes the function configuration on to the framework at launch.
fn set_function_env(context: &Context, layer: &mut Layer) {
    for (from, to) in [
        (env::FUNCTION_TARGET, "FUNCTION_TARGET"),
        (env::FUNCTION_SIGNATURE_TYPE, "FUNCTION_SIGNATURE_TYPE"),
        (env::FUNCTION_SOURCE, "FUNCTION_SOURCE"),
    ] {
        if let Some(value) = context.env_var(from) {
            layer
                .env_mut()
                .insert(Scope::Launch, ModificationBehavior::Default, to, value);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::{build, detect};
    use indoc::indoc;
    use libbuildpack::data::layer_content_metadata::LayerTypes;
    use libbuildpack::layer_env::Scope;
    use libbuildpack::testing::{ScriptedRunner, TestContextBuilder};
    use libbuildpack::ErrorKind;

    #[test]
    fn detect_needs_a_function_target() {
        let test = TestContextBuilder::new()
            .env("GOOGLE_FUNCTION_TARGET", "hello")
            .build();
        let result = detect(&test.context).unwrap();

        assert!(result.passed());
        assert_eq!(result.reason(), "GOOGLE_FUNCTION_TARGET set");
        let plan = result.build_plan().unwrap();
        assert!(plan.provides_name("requirements.txt"));
        assert!(plan.requires_name("requirements.txt"));

        let test = TestContextBuilder::new().file("main.py", "").build();
        let result = detect(&test.context).unwrap();

        assert!(!result.passed());
        assert_eq!(result.reason(), "GOOGLE_FUNCTION_TARGET not set");
    }

    #[test]
    fn build_injects_the_framework() {
        let mut test = TestContextBuilder::new()
            .file("main.py", "def hello(request):\n    return 'hi'\n")
            .file("requirements.txt", "functions-framework-example\n")
            .env("GOOGLE_FUNCTION_TARGET", "hello")
            .env("GOOGLE_FUNCTION_SIGNATURE_TYPE", "http")
            .build();

        build(&mut test.context).unwrap();

        assert!(test.runner.ran("python3 -m compileall -f -q ."));
        let layer = test
            .context
            .layer("functions-framework", LayerTypes::build().launch())
            .unwrap();
        let requirements = test
            .buildpack_dir()
            .join("converter")
            .join("requirements.txt");
        assert_eq!(
            layer
                .env()
                .apply_to_empty(Scope::Build)
                .get_string_lossy("GOOGLE_INTERNAL_REQUIREMENTS_FILES"),
            Some(requirements.display().to_string())
        );

        let launch_env = layer.env().apply_to_empty(Scope::Launch);
        assert_eq!(
            launch_env.get_string_lossy("FUNCTION_TARGET").as_deref(),
            Some("hello")
        );
        assert_eq!(
            launch_env.get_string_lossy("FUNCTION_SIGNATURE_TYPE").as_deref(),
            Some("http")
        );
        assert!(launch_env.get_string_lossy("FUNCTION_SOURCE").is_none());

        let processes = &test.context.launch().processes;
        assert_eq!(processes.len(), 1);
        assert_eq!(processes[0].r#type.as_str(), "web");
        assert_eq!(processes[0].command, ["functions-framework"]);
        assert!(processes[0].default);
    }

    #[test]
    fn build_uses_the_declared_framework() {
        for requirements in [
            "functions-framework==3.8.2\n",
            "functions-framework #pinned by the base image\n",
            indoc! {"
                flask
                functions-framework
            "},
            "git+https://github.com/GoogleCloudPlatform/functions-framework-python#egg=functions-framework\n",
        ] {
            let mut test = TestContextBuilder::new()
                .file("main.py", "")
                .file("requirements.txt", requirements)
                .env("GOOGLE_FUNCTION_TARGET", "hello")
                .env("GOOGLE_SKIP_FRAMEWORK_INJECTION", "True")
                .build();

            build(&mut test.context).unwrap();

            let layer = test
                .context
                .layer("functions-framework", LayerTypes::build().launch())
                .unwrap();
            assert!(
                layer
                    .env()
                    .apply_to_empty(Scope::Build)
                    .get_string_lossy("GOOGLE_INTERNAL_REQUIREMENTS_FILES")
                    .is_none(),
                "{requirements}"
            );
            assert_eq!(
                layer
                    .env()
                    .apply_to_empty(Scope::Launch)
                    .get_string_lossy("FUNCTION_TARGET")
                    .as_deref(),
                Some("hello")
            );
        }
    }

    #[test]
    fn skipped_injection_needs_a_declared_framework() {
        let mut test = TestContextBuilder::new()
            .file("main.py", "")
            .env("GOOGLE_FUNCTION_TARGET", "hello")
            .env("GOOGLE_SKIP_FRAMEWORK_INJECTION", "True")
            .build();

        let error = build(&mut test.context).unwrap_err();

        assert_eq!(error.kind(), ErrorKind::User);
        assert!(test.context.launch().processes.is_empty());
    }

    #[test]
    fn build_checks_the_function_source() {
        let mut test = TestContextBuilder::new()
            .file("app.py", "")
            .env("GOOGLE_FUNCTION_TARGET", "hello")
            .build();

        let error = build(&mut test.context).unwrap_err();

        assert_eq!(error.kind(), ErrorKind::User);
        assert!(error.to_string().starts_with("missing main.py"));
        assert!(!test.runner.ran("python3"));

        let mut test = TestContextBuilder::new()
            .file("main.py", "")
            .env("GOOGLE_FUNCTION_TARGET", "hello")
            .env("GOOGLE_FUNCTION_SOURCE", "functions/hello.py")
            .build();

        let error = build(&mut test.context).unwrap_err();

        assert_eq!(error.kind(), ErrorKind::User);
        assert!(error.to_string().contains(r#""functions/hello.py""#));
    }

    #[test]
    fn build_exports_a_custom_source() {
        let mut test = TestContextBuilder::new()
            .file("functions/hello.py", "")
            .env("GOOGLE_FUNCTION_TARGET", "hello")
            .env("GOOGLE_FUNCTION_SOURCE", "functions/hello.py")
            .build();

        build(&mut test.context).unwrap();

        let layer = test
            .context
            .layer("functions-framework", LayerTypes::build().launch())
            .unwrap();
        assert_eq!(
            layer
                .env()
                .apply_to_empty(Scope::Launch)
                .get_string_lossy("FUNCTION_SOURCE")
                .as_deref(),
            Some("functions/hello.py")
        );
    }

    #[test]
    fn compile_errors_fail_the_build() {
        let mut test = TestContextBuilder::new()
            .file("main.py", "def hello(:\n")
            .env("GOOGLE_FUNCTION_TARGET", "hello")
            .runner(ScriptedRunner::new().failure(
                "python3 -m compileall",
                1,
                "SyntaxError: invalid syntax",
            ))
            .build();

        let error = build(&mut test.context).unwrap_err();

        assert_eq!(error.kind(), ErrorKind::User);
    }
}
