//! Resolves semver-like version constraints against lists of available versions.
//!
//! Candidate versions are parsed leniently: a leading `v` is accepted and missing minor or patch
//! segments are treated as `0`. Constraints support exact versions, partial versions (which act
//! as wildcards on the missing segments), the comparison operators, tilde and caret ranges,
//! `x`/`*` wildcards, comma or space separated conjunctions, hyphen ranges and `||`
//! alternatives.

use semver::{BuildMetadata, Prerelease, Version};
use std::cmp::Ordering;

const SKIP_PREFIXES: [&str; 3] = ["deprecated", "public-image", "latest"];
const RELEASE_CANDIDATE_REGEX: &str = r"(\d+)\.(\d+)\.(.*)(rc|RC)(.*)";

#[derive(thiserror::Error, Debug, Clone, PartialEq, Eq)]
pub enum VersionError {
    #[error("Invalid version constraint {0:?}")]
    InvalidConstraint(String),

    #[error("Failed to parse version {0:?}")]
    InvalidVersion(String),

    #[error("Failed to match version {version:?} against {pattern:?}: {message}")]
    Pattern {
        pattern: String,
        version: String,
        message: String,
    },

    #[error("Failed to resolve version matching {constraint:?} against {versions:?}")]
    NoMatchingVersion {
        constraint: String,
        versions: Vec<String>,
    },
}

/// Options for [`resolve_version`].
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ResolveOptions {
    keep_original: bool,
}

impl ResolveOptions {
    /// Returns the matching version as it was given instead of its normalized form.
    #[must_use]
    pub fn without_sanitization() -> Self {
        Self {
            keep_original: true,
        }
    }
}

/// Returns the highest of `versions` that satisfies `constraint`.
///
/// An empty constraint matches any version. Release candidates and versions starting with
/// `deprecated`, `public-image` or `latest` are never selected.
///
/// # Examples
/// ```
/// use libbuildpack_commons::version::{resolve_version, ResolveOptions};
///
/// let versions = ["1.2.3", "1.2.4", "1.3.0", "0.1.2", "2.0.0"];
///
/// assert_eq!(resolve_version("~1.2.1", &versions, ResolveOptions::default()).unwrap(), "1.2.4");
/// assert_eq!(resolve_version("^1.2.1", &versions, ResolveOptions::default()).unwrap(), "1.3.0");
/// assert_eq!(resolve_version("", &versions, ResolveOptions::default()).unwrap(), "2.0.0");
/// ```
pub fn resolve_version<S: AsRef<str>>(
    constraint: &str,
    versions: &[S],
    options: ResolveOptions,
) -> Result<String, VersionError> {
    let constraint = if constraint.trim().is_empty() {
        "*"
    } else {
        constraint
    };
    let parsed_constraint = Constraint::parse(constraint)?;

    let mut candidates = Vec::new();
    for original in versions.iter().map(AsRef::as_ref) {
        if should_skip_version(original)? {
            continue;
        }
        let version = parse_lenient_version(original)
            .ok_or_else(|| VersionError::InvalidVersion(original.to_string()))?;
        candidates.push((version, original));
    }

    // Highest first. Equal versions are ordered by their build metadata, descending.
    candidates.sort_by(|(a, _), (b, _)| {
        precedence(b, a).then_with(|| b.build.as_str().cmp(a.build.as_str()))
    });

    candidates
        .iter()
        .find(|(version, _)| parsed_constraint.matches(version))
        .map(|(version, original)| {
            if options.keep_original {
                (*original).to_string()
            } else {
                version.to_string()
            }
        })
        .ok_or_else(|| VersionError::NoMatchingVersion {
            constraint: constraint.to_string(),
            versions: candidates
                .iter()
                .map(|(version, _)| version.to_string())
                .collect(),
        })
}

/// Returns true if the leniently parsed `version` satisfies `constraint`.
///
/// ```
/// use libbuildpack_commons::version::satisfies;
///
/// assert_eq!(satisfies(">=3.13.0-0", "3.13"), Ok(true));
/// assert_eq!(satisfies(">=3.13.0-0", "3.14.0-rc1"), Ok(true));
/// assert_eq!(satisfies(">=3.13.0-0", "3.12.8"), Ok(false));
/// ```
pub fn satisfies(constraint: &str, version: &str) -> Result<bool, VersionError> {
    let constraint = Constraint::parse(constraint)?;
    let version = parse_lenient_version(version)
        .ok_or_else(|| VersionError::InvalidVersion(version.to_string()))?;

    Ok(constraint.matches(&version))
}

/// Returns true if `version` is a full `major.minor.patch` version.
#[must_use]
pub fn is_exact_semver(version: &str) -> bool {
    version.matches('.').count() == 2 && parse_lenient_version(version).is_some()
}

/// Returns true for release candidate versions such as `3.12.0rc1`.
pub fn is_release_candidate(version: &str) -> Result<bool, VersionError> {
    fancy_regex::Regex::new(RELEASE_CANDIDATE_REGEX)
        .and_then(|regex| regex.is_match(version))
        .map_err(|error| VersionError::Pattern {
            pattern: String::from(RELEASE_CANDIDATE_REGEX),
            version: version.to_string(),
            message: error.to_string(),
        })
}

fn should_skip_version(version: &str) -> Result<bool, VersionError> {
    let lowercase = version.to_lowercase();
    Ok(SKIP_PREFIXES
        .iter()
        .any(|prefix| lowercase.starts_with(prefix))
        || is_release_candidate(version)?)
}

/// Parses `v1`, `1.2`, `1.2.3-beta.1+build.5` and similar into a full semver version.
fn parse_lenient_version(value: &str) -> Option<Version> {
    let value = value.trim();
    let value = value.strip_prefix('v').unwrap_or(value);

    let (value, build) = match value.split_once('+') {
        Some((value, build)) => (value, BuildMetadata::new(build).ok()?),
        None => (value, BuildMetadata::EMPTY),
    };
    let (core, pre) = match value.split_once('-') {
        Some((core, pre)) => (core, Prerelease::new(pre).ok()?),
        None => (value, Prerelease::EMPTY),
    };

    let numbers = core
        .split('.')
        .map(parse_number)
        .collect::<Option<Vec<u64>>>()?;
    let (major, minor, patch) = match numbers.as_slice() {
        [major] => (*major, 0, 0),
        [major, minor] => (*major, *minor, 0),
        [major, minor, patch] => (*major, *minor, *patch),
        _ => return None,
    };

    Some(Version {
        major,
        minor,
        patch,
        pre,
        build,
    })
}

fn parse_number(value: &str) -> Option<u64> {
    if value.is_empty() || !value.bytes().all(|byte| byte.is_ascii_digit()) {
        return None;
    }
    value.parse().ok()
}

/// Compares two versions ignoring build metadata.
fn precedence(a: &Version, b: &Version) -> Ordering {
    (a.major, a.minor, a.patch, &a.pre).cmp(&(b.major, b.minor, b.patch, &b.pre))
}

/// A parsed constraint: a disjunction of conjunctions of comparators.
#[derive(Debug, Clone, PartialEq, Eq)]
struct Constraint {
    alternatives: Vec<Vec<Comparator>>,
}

impl Constraint {
    fn parse(value: &str) -> Result<Self, VersionError> {
        let invalid = || VersionError::InvalidConstraint(value.to_string());

        let alternatives = value
            .split("||")
            .map(|alternative| parse_conjunction(alternative).ok_or_else(invalid))
            .collect::<Result<Vec<_>, _>>()?;

        Ok(Self { alternatives })
    }

    fn matches(&self, version: &Version) -> bool {
        self.alternatives.iter().any(|comparators| {
            // Prerelease versions are only considered if the constraint asks for one.
            (version.pre.is_empty()
                || comparators
                    .iter()
                    .any(|comparator| !comparator.version.pre.is_empty()))
                && comparators
                    .iter()
                    .all(|comparator| comparator.matches(version))
        })
    }
}

fn parse_conjunction(value: &str) -> Option<Vec<Comparator>> {
    let value = value.replace(',', " ");
    let tokens: Vec<&str> = value.split_whitespace().collect();
    if tokens.is_empty() {
        return None;
    }

    let mut comparators = Vec::new();
    let mut index = 0;
    while index < tokens.len() {
        // `1.2 - 1.4`
        if tokens.get(index + 1) == Some(&"-") {
            let lower = PartialVersion::parse(tokens[index])?;
            let upper = PartialVersion::parse(tokens.get(index + 2)?)?;
            comparators.push(Comparator::new(Op::GreaterEq, lower));
            comparators.push(Comparator::new(Op::LessEq, upper));
            index += 3;
            continue;
        }

        // Operators may be separated from their version by whitespace: `>= 1.2.3`.
        let token = tokens[index];
        let comparator = if token.chars().all(is_operator_char) {
            index += 1;
            Comparator::parse(&format!("{token}{}", tokens.get(index)?))?
        } else {
            Comparator::parse(token)?
        };
        comparators.push(comparator);
        index += 1;
    }

    Some(comparators)
}

fn is_operator_char(c: char) -> bool {
    matches!(c, '=' | '!' | '<' | '>' | '~' | '^')
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Op {
    Exact,
    NotEqual,
    Greater,
    GreaterEq,
    Less,
    LessEq,
    Tilde,
    Caret,
}

/// A version in a constraint. `None` segments were missing or wildcards.
#[derive(Debug, Clone, PartialEq, Eq)]
struct PartialVersion {
    major: Option<u64>,
    minor: Option<u64>,
    patch: Option<u64>,
    pre: Prerelease,
}

impl PartialVersion {
    fn parse(value: &str) -> Option<Self> {
        let value = value.strip_prefix('v').unwrap_or(value);
        let value = value.split_once('+').map_or(value, |(value, _)| value);
        let (core, pre) = match value.split_once('-') {
            Some((core, pre)) => (core, Prerelease::new(pre).ok()?),
            None => (value, Prerelease::EMPTY),
        };

        let mut segments = Vec::new();
        for segment in core.split('.') {
            segments.push(match segment {
                "*" | "x" | "X" => None,
                // Range bounds are one above a segment, so the largest value is reserved.
                number => Some(parse_number(number).filter(|number| *number < u64::MAX)?),
            });
        }
        if segments.len() > 3 {
            return None;
        }
        segments.resize(3, None);

        // Nothing may follow a wildcard: `1.*.3` is invalid.
        if segments
            .windows(2)
            .any(|pair| pair[0].is_none() && pair[1].is_some())
        {
            return None;
        }

        Some(Self {
            major: segments[0],
            minor: segments[1],
            patch: segments[2],
            pre,
        })
    }

    fn is_complete(&self) -> bool {
        self.patch.is_some()
    }

    /// The smallest version matched by this partial version.
    fn lower(&self) -> Version {
        Version {
            major: self.major.unwrap_or(0),
            minor: self.minor.unwrap_or(0),
            patch: self.patch.unwrap_or(0),
            pre: self.pre.clone(),
            build: BuildMetadata::EMPTY,
        }
    }

    /// The smallest version above everything matched by this partial version. `None` when
    /// every version matches.
    fn upper(&self) -> Option<Version> {
        match (self.major, self.minor, self.patch) {
            (None, _, _) => None,
            (Some(major), None, _) => Some(Version::new(major + 1, 0, 0)),
            (Some(major), Some(minor), None) => Some(Version::new(major, minor + 1, 0)),
            (Some(major), Some(minor), Some(patch)) => Some(Version::new(major, minor, patch + 1)),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
struct Comparator {
    op: Op,
    version: PartialVersion,
}

impl Comparator {
    fn new(op: Op, version: PartialVersion) -> Self {
        Self { op, version }
    }

    fn parse(value: &str) -> Option<Self> {
        let operator_length = value
            .find(|c: char| !is_operator_char(c))
            .unwrap_or(value.len());
        let (operator, version) = value.split_at(operator_length);

        let op = match operator {
            "" | "=" | "==" => Op::Exact,
            "!=" => Op::NotEqual,
            ">" => Op::Greater,
            ">=" | "=>" => Op::GreaterEq,
            "<" => Op::Less,
            "<=" | "=<" => Op::LessEq,
            "~" | "~>" => Op::Tilde,
            "^" => Op::Caret,
            _ => return None,
        };

        Some(Self::new(op, PartialVersion::parse(version.trim())?))
    }

    fn matches(&self, version: &Version) -> bool {
        let lower = self.version.lower();
        let at_least = |bound: &Version| precedence(version, bound) != Ordering::Less;
        let below = |bound: &Version| precedence(version, bound) == Ordering::Less;
        let in_range = |upper: Option<Version>| {
            at_least(&lower) && upper.map_or(true, |upper| below(&upper))
        };

        match self.op {
            Op::Exact if self.version.is_complete() => {
                precedence(version, &lower) == Ordering::Equal
            }
            Op::Exact => in_range(self.version.upper()),
            Op::NotEqual if self.version.is_complete() => {
                precedence(version, &lower) != Ordering::Equal
            }
            Op::NotEqual => !in_range(self.version.upper()),
            Op::Greater if self.version.is_complete() => {
                precedence(version, &lower) == Ordering::Greater
            }
            Op::Greater => self.version.upper().is_some_and(|upper| at_least(&upper)),
            Op::GreaterEq => at_least(&lower),
            Op::Less => below(&lower),
            Op::LessEq if self.version.is_complete() => {
                precedence(version, &lower) != Ordering::Greater
            }
            Op::LessEq => self.version.upper().map_or(true, |upper| below(&upper)),
            Op::Tilde => {
                let upper = match (self.version.major, self.version.minor) {
                    (None, _) => None,
                    (Some(major), None) => Some(Version::new(major + 1, 0, 0)),
                    (Some(major), Some(minor)) => Some(Version::new(major, minor + 1, 0)),
                };
                in_range(upper)
            }
            Op::Caret => {
                let upper = match (self.version.major, self.version.minor, self.version.patch) {
                    (None, _, _) => None,
                    (Some(major), None, _) => Some(Version::new(major + 1, 0, 0)),
                    (Some(0), Some(0), Some(patch)) => Some(Version::new(0, 0, patch + 1)),
                    (Some(0), Some(minor), _) => Some(Version::new(0, minor + 1, 0)),
                    (Some(major), Some(_), _) => Some(Version::new(major + 1, 0, 0)),
                };
                in_range(upper)
            }
        }
    }
}
