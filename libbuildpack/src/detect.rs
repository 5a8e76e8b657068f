use crate::data::build_plan::BuildPlan;

/// Describes the result of the detect phase.
///
/// Besides indicating passing or failing detection, it also carries the reason shown in the
/// detect output and the build plan. To construct values of this type, use a
/// [`DetectResultBuilder`].
#[derive(Debug, Clone, PartialEq)]
pub struct DetectResult(pub(crate) InnerDetectResult);

#[derive(Debug, Clone, PartialEq)]
pub(crate) enum InnerDetectResult {
    Fail {
        reason: String,
    },
    Pass {
        reason: String,
        build_plan: Option<BuildPlan>,
    },
}

impl DetectResult {
    #[must_use]
    pub fn passed(&self) -> bool {
        matches!(self.0, InnerDetectResult::Pass { .. })
    }

    #[must_use]
    pub fn reason(&self) -> &str {
        match &self.0 {
            InnerDetectResult::Fail { reason } | InnerDetectResult::Pass { reason, .. } => reason,
        }
    }

    #[must_use]
    pub fn build_plan(&self) -> Option<&BuildPlan> {
        match &self.0 {
            InnerDetectResult::Pass { build_plan, .. } => build_plan.as_ref(),
            InnerDetectResult::Fail { .. } => None,
        }
    }
}

/// Constructs [`DetectResult`] values.
///
/// # Examples:
/// ```
/// use libbuildpack::detect::DetectResultBuilder;
/// use libbuildpack::data::build_plan::BuildPlanBuilder;
///
/// let opt_out = DetectResultBuilder::fail("requirements.txt not found").build();
/// assert!(!opt_out.passed());
///
/// let opt_in = DetectResultBuilder::pass("found requirements.txt")
///     .build_plan(
///         BuildPlanBuilder::new()
///             .provides("requirements.txt")
///             .requires("requirements.txt")
///             .build(),
///     )
///     .build();
/// assert!(opt_in.passed());
/// assert!(opt_in.build_plan().is_some());
/// ```
pub struct DetectResultBuilder;

impl DetectResultBuilder {
    pub fn pass(reason: impl Into<String>) -> PassDetectResultBuilder {
        PassDetectResultBuilder {
            reason: reason.into(),
            build_plan: None,
        }
    }

    pub fn fail(reason: impl Into<String>) -> FailDetectResultBuilder {
        FailDetectResultBuilder {
            reason: reason.into(),
        }
    }
}

pub struct PassDetectResultBuilder {
    reason: String,
    build_plan: Option<BuildPlan>,
}

impl PassDetectResultBuilder {
    #[must_use]
    pub fn build(self) -> DetectResult {
        DetectResult(InnerDetectResult::Pass {
            reason: self.reason,
            build_plan: self.build_plan,
        })
    }

    #[must_use]
    pub fn build_plan(mut self, build_plan: BuildPlan) -> Self {
        self.build_plan = Some(build_plan);
        self
    }
}

pub struct FailDetectResultBuilder {
    reason: String,
}

impl FailDetectResultBuilder {
    #[must_use]
    pub fn build(self) -> DetectResult {
        DetectResult(InnerDetectResult::Fail {
            reason: self.reason,
        })
    }
}
