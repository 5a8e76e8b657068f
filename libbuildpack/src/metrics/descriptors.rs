use super::MetricId;

/// Name and description of a metric, as reported to the metrics backend.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Descriptor {
    pub id: MetricId,
    pub name: &'static str,
    pub description: &'static str,
}

const fn descriptor(id: MetricId, name: &'static str, description: &'static str) -> Descriptor {
    Descriptor {
        id,
        name,
        description,
    }
}

pub(super) const DESCRIPTORS: [Descriptor; 21] = [
    descriptor(
        MetricId::ArNpmCredsGenerated,
        "npm_artifact_registry_creds_generated",
        "The number of artifact registry credentials generated for NPM",
    ),
    descriptor(
        MetricId::NpmGcpBuildScriptUses,
        "npm_gcp_build_script_uses",
        "The number of times the gcp-build script is used by npm developers",
    ),
    descriptor(
        MetricId::NpmBuildScriptUses,
        "npm_build_script_uses",
        "The number of times an npm build script is used by npm developers",
    ),
    descriptor(
        MetricId::NpmGoogleNodeRunScriptUses,
        "npm_google_node_run_script_uses",
        "The number of times the GOOGLE_NODE_RUN_SCRIPTS env var is used by npm developers",
    ),
    descriptor(
        MetricId::VendorPipDependenciesUses,
        "vendor_pip_dependencies_uses",
        "The number of times GOOGLE_VENDOR_PIP_DEPENDENCIES is used by developers",
    ),
    descriptor(
        MetricId::NpmNodeModulesUses,
        "npm_node_modules_uses",
        "The number of times node_modules directory exist in source code",
    ),
    descriptor(
        MetricId::VendorNpmDependenciesUses,
        "vendor_npm_dependencies_uses",
        "The number of times GOOGLE_VENDOR_NPM_DEPENDENCIES is used by developers",
    ),
    descriptor(
        MetricId::NpmInstallLatency,
        "npm_install_latency",
        "The latency for executions of `npm install`",
    ),
    descriptor(
        MetricId::ComposerInstallLatency,
        "composer_install_latency",
        "The latency for executions of `composer install`",
    ),
    descriptor(
        MetricId::PipInstallLatency,
        "pip_install_latency",
        "The latency for executions of `pip install`",
    ),
    descriptor(
        MetricId::JavaGaeWebXmlConfigUses,
        "java_gae_web_xml_config_uses",
        "The number of times the appengine-web.xml is used by developers",
    ),
    descriptor(
        MetricId::JavaGaeSessionHandlerUses,
        "java_gae_session_handler_uses",
        "The number of times the session handler is used by developers",
    ),
    descriptor(
        MetricId::NodejsBytecodeCacheGenerated,
        "nodejs_bytecode_cache_generated",
        "The number of times the bytecode cache is generated for Node.js applications",
    ),
    descriptor(
        MetricId::PipUsage,
        "pip_usage",
        "The number of times pip is used by developers",
    ),
    descriptor(
        MetricId::PoetryUsage,
        "poetry_usage",
        "The number of times poetry is used by developers",
    ),
    descriptor(
        MetricId::UvUsage,
        "uv_usage",
        "The number of times uv is used by developers",
    ),
    descriptor(
        MetricId::NpmUsage,
        "npm_usage",
        "The number of times npm is used by developers",
    ),
    descriptor(
        MetricId::YarnUsage,
        "yarn_usage",
        "The number of times yarn is used by developers",
    ),
    descriptor(
        MetricId::PnpmUsage,
        "pnpm_usage",
        "The number of times pnpm is used by developers",
    ),
    descriptor(
        MetricId::JavaSpringBootUsage,
        "java_spring_boot_usage",
        "The number of times Spring Boot is used by developers",
    ),
    descriptor(
        MetricId::BunUsage,
        "bun_usage",
        "The number of times bun is used as a package manager",
    ),
];
