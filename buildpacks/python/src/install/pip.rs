//! Installing dependencies with pip.

use super::{
    append_vendoring_flags, base_pip_install_args, check_incompatible_dependencies, command,
    compile_bytecode, existing_app_files, prepend_context_path, PipInstaller,
};
use crate::dependencies::{prepare_dependencies_layer, refresh_layer};
use crate::manifest::RequirementsFiles;
use crate::pyproject::PYPROJECT_TOML;
use crate::runtime_version::python_version;
use libbuildpack::config::env;
use libbuildpack::context::ExecOptions;
use libbuildpack::layer::Layer;
use libbuildpack::layer_env::{ModificationBehavior, Scope};
use libbuildpack::{BuildpackError, Context, Result};
use libbuildpack_commons::cache::CacheInput;
use std::fs;
use std::path::{Path, PathBuf};

pub const DEFAULT_PIP_TARGET_DIR: &str = "lib";

const PYTHON37_SHARED_LIB_DIR: &str =
    "/layers/google.python.runtime/python/lib/python3.7/config-3.7m-x86_64-linux-gnu";
const PYTHON38_SHARED_LIB_DIR: &str =
    "/layers/google.python.runtime/python/lib/python3.8/config-3.8-x86_64-linux-gnu";

/// Installs requirements into the Python user site-packages directory (PEP 370) rooted at the
/// layer.
///
/// The python37 and python38 runtimes disable user site-packages, so a virtual environment is
/// created in the layer instead.
#[derive(Debug, Clone, Copy, Default)]
pub struct UserSitePipInstaller;

impl PipInstaller for UserSitePipInstaller {
    fn install(
        &self,
        context: &mut Context,
        layer: &mut Layer,
        requirements: &RequirementsFiles,
    ) -> Result<()> {
        if !prepare_dependencies_layer(context, layer, "pip", requirements)? {
            context.log("Application dependencies are up to date, skipping installation.");
            return Ok(());
        }
        context.log("Installing application dependencies.");

        let layer_path = layer.path().to_path_buf();
        let virtual_env = requires_virtual_env(context);
        if virtual_env {
            // Reuses pip and other packages of the runtime instead of installing them again.
            context.exec(
                [
                    "python3",
                    "-m",
                    "venv",
                    "--without-pip",
                    "--system-site-packages",
                    &*layer_path.to_string_lossy(),
                ],
                &ExecOptions::new(),
            )?;
            link_shared_libs(context, layer)?;

            layer.env_mut().insert(
                Scope::Shared,
                ModificationBehavior::Override,
                "VIRTUAL_ENV",
                &layer_path,
            );
            prepend_context_path(context, &layer_path.join("bin"));
            context.set_env("VIRTUAL_ENV", &layer_path);
        } else {
            layer.env_mut().insert(
                Scope::Shared,
                ModificationBehavior::Default,
                "PYTHONUSERBASE",
                &layer_path,
            );
            context.set_env("PYTHONUSERBASE", &layer_path);
        }

        for requirements_file in requirements.iter() {
            let mut install_command = base_pip_install_args(requirements_file);
            install_command.push(String::from("--no-cache-dir"));
            append_vendoring_flags(context, &mut install_command);
            if !virtual_env {
                install_command.push(String::from("--user"));
            }

            context.exec(&install_command, &ExecOptions::new().user_attribution())?;
        }

        compile_bytecode(context, &layer_path)?;
        check_incompatible_dependencies(
            context,
            &["python3", "-m", "pip", "check"],
            &ExecOptions::new(),
        )
    }
}

/// Installs requirements into a directory of the application with `pip install --target`.
///
/// The directory is `GOOGLE_PIP_TARGET_DIR`, or `lib` if unset. Relative directories are
/// resolved against the application directory.
#[derive(Debug, Clone, Copy, Default)]
pub struct TargetDirPipInstaller;

impl PipInstaller for TargetDirPipInstaller {
    fn install(
        &self,
        context: &mut Context,
        layer: &mut Layer,
        requirements: &RequirementsFiles,
    ) -> Result<()> {
        let target_dir = context
            .env_var(env::PIP_TARGET_DIR)
            .unwrap_or_else(|| String::from(DEFAULT_PIP_TARGET_DIR));
        context.log(format!(
            "Installing dependencies to target directory: {target_dir}"
        ));
        let target_path = if Path::new(&target_dir).is_absolute() {
            PathBuf::from(&target_dir)
        } else {
            context.app_dir().join(&target_dir)
        };

        let layer_env = layer.env_mut();
        layer_env.insert(
            Scope::Launch,
            ModificationBehavior::Override,
            "PYTHONPATH",
            &target_dir,
        );
        layer_env.insert(
            Scope::Shared,
            ModificationBehavior::Override,
            "PYTHONPATH",
            &target_path,
        );

        for requirements_file in requirements.iter() {
            let mut install_command = base_pip_install_args(requirements_file);
            append_vendoring_flags(context, &mut install_command);
            install_command.push(String::from("--target"));
            install_command.push(target_path.to_string_lossy().into_owned());

            context.exec(&install_command, &ExecOptions::new().user_attribution())?;
        }

        Ok(())
    }
}

/// Installs the project in the application directory, as described by its `pyproject.toml`.
pub fn pip_install_pyproject(context: &Context, layer: &mut Layer) -> Result<()> {
    context.log("Installing application dependencies from pyproject.toml.");

    let version = python_version(context)?;
    let inputs = [
        CacheInput::files(existing_app_files(context, &[PYPROJECT_TOML])),
        CacheInput::strings([version.as_str(), "pip-pyproject"]),
    ];
    if !refresh_layer(context, layer, &inputs, &version)? {
        context.log("Dependencies cached and not expired. Skipping installation.");
        return Ok(());
    }

    let mut install_command = command(&[
        "python3",
        "-m",
        "pip",
        "install",
        ".",
        "--upgrade",
        "--upgrade-strategy",
        "only-if-needed",
        "--no-warn-script-location",
        "--disable-pip-version-check",
        "--no-cache-dir",
    ]);
    append_vendoring_flags(context, &mut install_command);

    context.exec(&install_command, &ExecOptions::new().user_attribution())?;
    Ok(())
}

fn requires_virtual_env(context: &Context) -> bool {
    matches!(
        context.env_var(env::RUNTIME).as_deref(),
        Some("python37" | "python38")
    )
}

/// Links the shared Python library of the runtime into the virtual environment, which doesn't
/// copy it. Native extensions of the legacy runtimes need it to build.
fn link_shared_libs(context: &Context, layer: &Layer) -> Result<()> {
    let (shared_lib_dir, python_dir) = match context.env_var(env::RUNTIME).as_deref() {
        Some("python37") => (PYTHON37_SHARED_LIB_DIR, "python3.7"),
        Some("python38") => (PYTHON38_SHARED_LIB_DIR, "python3.8"),
        _ => return Ok(()),
    };

    let shared_lib_dir = Path::new(shared_lib_dir);
    if !shared_lib_dir.exists() {
        return Ok(());
    }

    let lib_dir = layer.path().join("lib").join(python_dir);
    let link = lib_dir.join(shared_lib_dir.file_name().unwrap_or_default());
    fs::create_dir_all(&lib_dir)
        .and_then(|()| std::os::unix::fs::symlink(shared_lib_dir, &link))
        .map_err(|error| {
            BuildpackError::internal(format!(
                "symlinking shared libs from {} to {}: {error}",
                shared_lib_dir.display(),
                link.display()
            ))
        })
}

#[cfg(test)]
mod tests {
    use super::{pip_install_pyproject, TargetDirPipInstaller, UserSitePipInstaller};
    use crate::install::PipInstaller;
    use crate::manifest::RequirementsFiles;
    use libbuildpack::data::layer_content_metadata::LayerTypes;
    use libbuildpack::layer_env::Scope;
    use libbuildpack::testing::{ScriptedRunner, TestContext, TestContextBuilder};

    fn requirements_app(builder: TestContextBuilder) -> TestContext {
        builder
            .file("requirements.txt", "flask==3.1.0\n")
            .runner(ScriptedRunner::new().stdout("python3 --version", "Python 3.13.1"))
            .build()
    }

    fn install(test: &mut TestContext, installer: &dyn PipInstaller) {
        let requirements = RequirementsFiles::discover(&test.context);
        let mut layer = test.context.layer("pip", LayerTypes::all()).unwrap();
        installer
            .install(&mut test.context, &mut layer, &requirements)
            .unwrap();
        test.context.write_layer(&layer).unwrap();
    }

    #[test]
    fn user_site_install() {
        let mut test = requirements_app(TestContextBuilder::new());

        install(&mut test, &UserSitePipInstaller);

        let layer_dir = test.layers_dir().join("pip");
        let requirements = test.app_dir().join("requirements.txt");
        assert_eq!(
            test.runner.command_lines(),
            vec![
                String::from("python3 --version"),
                format!(
                    "python3 -m pip install --requirement {} --upgrade --upgrade-strategy only-if-needed --no-warn-script-location --no-warn-conflicts --force-reinstall --no-compile --disable-pip-version-check --no-cache-dir --user",
                    requirements.display()
                ),
                format!(
                    "python3 -m compileall --invalidation-mode unchecked-hash -qq {}",
                    layer_dir.display()
                ),
                String::from("python3 -m pip check"),
            ]
        );
        assert_eq!(
            test.runner
                .find("python3 -m pip install")
                .unwrap()
                .env
                .get_string_lossy("PYTHONUSERBASE"),
            Some(layer_dir.to_string_lossy().into_owned())
        );

        let layer = test.context.layer("pip", LayerTypes::all()).unwrap();
        assert_eq!(
            layer
                .env()
                .apply_to_empty(Scope::Launch)
                .get_string_lossy("PYTHONUSERBASE"),
            Some(layer_dir.to_string_lossy().into_owned())
        );
    }

    #[test]
    fn unchanged_requirements_are_not_installed_again() {
        let mut test = requirements_app(TestContextBuilder::new());

        install(&mut test, &UserSitePipInstaller);
        install(&mut test, &UserSitePipInstaller);

        assert_eq!(
            test.runner
                .command_lines()
                .iter()
                .filter(|line| line.starts_with("python3 -m pip install"))
                .count(),
            1
        );
    }

    #[test]
    fn legacy_runtimes_use_a_virtual_environment() {
        let mut test = requirements_app(
            TestContextBuilder::new()
                .env("GOOGLE_RUNTIME", "python38")
                .env("PATH", "/usr/bin"),
        );

        install(&mut test, &UserSitePipInstaller);

        let layer_dir = test.layers_dir().join("pip");
        assert!(test.runner.ran(&format!(
            "python3 -m venv --without-pip --system-site-packages {}",
            layer_dir.display()
        )));
        let pip_install = test.runner.find("python3 -m pip install").unwrap();
        assert!(!pip_install.args.contains(&String::from("--user")));
        assert_eq!(
            pip_install.env.get_string_lossy("VIRTUAL_ENV"),
            Some(layer_dir.to_string_lossy().into_owned())
        );
        assert_eq!(
            test.context.env().get_string_lossy("PATH"),
            Some(format!("{}:/usr/bin", layer_dir.join("bin").display()))
        );
    }

    #[test]
    fn vendored_dependencies() {
        let mut test = requirements_app(
            TestContextBuilder::new().env("GOOGLE_VENDOR_PIP_DEPENDENCIES", "wheels"),
        );

        install(&mut test, &UserSitePipInstaller);

        let pip_install = test.runner.find("python3 -m pip install").unwrap();
        assert!(pip_install
            .command_line()
            .ends_with("--no-cache-dir --no-index --find-links wheels --user"));
    }

    #[test]
    fn target_dir_install() {
        let mut test = requirements_app(TestContextBuilder::new());

        install(&mut test, &TargetDirPipInstaller);

        let target = test.app_dir().join("lib");
        let pip_install = test.runner.find("python3 -m pip install").unwrap();
        assert!(pip_install
            .command_line()
            .ends_with(&format!("--disable-pip-version-check --target {}", target.display())));

        let layer = test.context.layer("pip", LayerTypes::all()).unwrap();
        assert_eq!(
            layer
                .env()
                .apply_to_empty(Scope::Launch)
                .get_string_lossy("PYTHONPATH")
                .as_deref(),
            Some("lib")
        );
        assert_eq!(
            layer
                .env()
                .apply_to_empty(Scope::Build)
                .get_string_lossy("PYTHONPATH"),
            Some(target.to_string_lossy().into_owned())
        );
    }

    #[test]
    fn absolute_target_dir() {
        let mut test = requirements_app(
            TestContextBuilder::new().env("GOOGLE_PIP_TARGET_DIR", "/workspace/deps"),
        );

        install(&mut test, &TargetDirPipInstaller);

        assert!(test
            .runner
            .find("python3 -m pip install")
            .unwrap()
            .command_line()
            .ends_with("--target /workspace/deps"));
    }

    #[test]
    fn pyproject_install() {
        let test = TestContextBuilder::new()
            .file("pyproject.toml", "[project]\nname = \"app\"\n")
            .runner(ScriptedRunner::new().stdout("python3 --version", "Python 3.13.1"))
            .build();
        let mut layer = test.context.layer("pip", LayerTypes::all()).unwrap();

        pip_install_pyproject(&test.context, &mut layer).unwrap();
        test.context.write_layer(&layer).unwrap();
        let mut layer = test.context.layer("pip", LayerTypes::all()).unwrap();
        pip_install_pyproject(&test.context, &mut layer).unwrap();

        assert_eq!(
            test.runner
                .command_lines()
                .iter()
                .filter(|line| line.starts_with("python3 -m pip install"))
                .collect::<Vec<_>>(),
            vec!["python3 -m pip install . --upgrade --upgrade-strategy only-if-needed --no-warn-script-location --disable-pip-version-check --no-cache-dir"]
        );
    }
}
