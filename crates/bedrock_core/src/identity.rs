//! Cluster identity generation and validation.

use std::fmt;
use std::sync::OnceLock;

use bedrock_iac::EnvironmentKind;
use rand::seq::SliceRandom;
use rand::Rng;
use regex::Regex;
use serde::{Deserialize, Serialize};
use tracing::{debug, info};

use crate::error::{CoreError, CoreResult};

/// Identities must be strictly shorter than this.
pub const MAX_IDENTITY_LEN: usize = 30;

const MAX_ATTEMPTS: usize = 10;

const ADJECTIVES: &[&str] = &[
    "admiring", "affectionate", "agitated", "amazing", "angry", "awesome", "blissful",
    "bold", "boring", "brave", "busy", "charming", "clever", "compassionate", "competent",
    "condescending", "confident", "cranky", "dazzling", "determined", "distracted",
    "dreamy", "eager", "ecstatic", "elastic", "elated", "elegant", "eloquent", "epic",
    "festive", "focused", "friendly", "frosty", "gallant", "gifted", "goofy", "gracious",
    "happy", "hardcore", "heuristic", "hopeful", "hungry", "infallible", "inspiring",
    "jolly", "jovial", "keen", "kind", "laughing", "loving", "lucid", "magical",
    "modest", "musing", "mystifying", "naughty", "nervous", "nifty", "nostalgic",
    "objective", "optimistic", "peaceful", "pedantic", "pensive", "practical",
    "priceless", "quirky", "quizzical", "relaxed", "reverent", "romantic", "sad",
    "serene", "sharp", "silly", "sleepy", "stoic", "strange", "stupefied", "suspicious",
    "sweet", "tender", "thirsty", "trusting", "unruffled", "upbeat", "vibrant",
    "vigilant", "vigorous", "wizardly", "wonderful", "xenodochial", "youthful", "zealous",
    "zen",
];

const NAMES: &[&str] = &[
    "albattani", "allen", "almeida", "archimedes", "ardinghelli", "aryabhata", "austin",
    "babbage", "banach", "bardeen", "bartik", "bassi", "bell", "bhabha", "blackburn",
    "blackwell", "bohr", "booth", "borg", "bose", "boyd", "brahmagupta", "brattain",
    "brown", "carson", "chandrasekhar", "chatelet", "chaum", "clarke", "colden", "cori",
    "cray", "curie", "darwin", "davinci", "dijkstra", "dubinsky", "easley", "edison",
    "einstein", "elion", "engelbart", "euclid", "euler", "fermat", "fermi", "feynman",
    "franklin", "galileo", "gates", "goldberg", "goldstine", "goodall", "hamilton",
    "haslett", "hawking", "heisenberg", "hermann", "hodgkin", "hoover", "hopper",
    "hypatia", "jackson", "jang", "jennings", "jepsen", "johnson", "joliot", "jones",
    "kalam", "kapitsa", "keller", "kepler", "khorana", "kilby", "kirch", "knuth",
    "kowalevski", "lalande", "lamarr", "lamport", "leakey", "leavitt", "lewin",
    "lichterman", "liskov", "lovelace", "lumiere", "mahavira", "mayer", "mccarthy",
    "mcclintock", "mclean", "mcnulty", "meitner", "mendel", "mirzakhani", "morse",
    "murdock", "newton", "nightingale", "nobel", "noether", "northcutt", "noyce",
    "panini", "pare", "pasteur", "payne", "perlman", "pike", "poincare", "poitras",
    "ptolemy", "raman", "ramanujan", "ride", "ritchie", "roentgen", "rosalind",
    "saha", "sammet", "shamir", "shannon", "shaw", "shirley", "shockley", "sinoussi",
    "snyder", "spence", "stallman", "stonebraker", "swanson", "swartz", "swirles",
    "tesla", "thompson", "torvalds", "turing", "varahamihira", "visvesvaraya",
    "volhard", "wescoff", "wiles", "williams", "wilson", "wing", "wozniak", "wright",
    "yalow", "yonath",
];

fn identity_pattern() -> Option<&'static Regex> {
    static PATTERN: OnceLock<Option<Regex>> = OnceLock::new();
    PATTERN
        .get_or_init(|| Regex::new(r"^[a-z0-9](?:[a-z0-9-]*[a-z0-9])?$").ok())
        .as_ref()
}

/// Names of environment directories. An identity with one of these names
/// would place its instances inside the template tree of that kind.
fn is_reserved(name: &str) -> bool {
    EnvironmentKind::all().iter().any(|kind| kind.as_str() == name)
}

/// The unique name prefixing every resource of one environment instance.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct ClusterIdentity(String);

impl ClusterIdentity {
    /// Validate a caller-supplied name.
    pub fn parse(name: &str) -> CoreResult<Self> {
        let invalid = |reason: &str| CoreError::InvalidIdentity {
            name: name.to_string(),
            reason: reason.to_string(),
        };

        if name.is_empty() {
            return Err(invalid("name is empty"));
        }
        if name.len() >= MAX_IDENTITY_LEN {
            return Err(invalid(&format!(
                "must be shorter than {} characters",
                MAX_IDENTITY_LEN
            )));
        }
        let pattern =
            identity_pattern().ok_or_else(|| invalid("name pattern failed to compile"))?;
        if !pattern.is_match(name) {
            return Err(invalid(
                "only lowercase letters, digits and inner hyphens are allowed",
            ));
        }
        if is_reserved(name) {
            return Err(invalid("name is reserved for an environment directory"));
        }
        Ok(Self(name.to_string()))
    }

    /// Use the supplied name, or generate one when it is absent or empty.
    pub fn resolve(name: Option<&str>) -> CoreResult<Self> {
        match name.map(str::trim).filter(|n| !n.is_empty()) {
            Some(name) => Self::parse(name),
            None => {
                let identity = Self::generate();
                info!("Generated cluster name: {}", identity);
                Ok(identity)
            }
        }
    }

    /// Generate a random `adjective-name` identity.
    pub fn generate() -> Self {
        Self::generate_with(&mut rand::thread_rng())
    }

    pub fn generate_with<R: Rng + ?Sized>(rng: &mut R) -> Self {
        Self::generate_from(|| {
            let adjective = ADJECTIVES.choose(&mut *rng).copied().unwrap_or("bold");
            let name = NAMES.choose(&mut *rng).copied().unwrap_or("turing");
            format!("{}_{}", adjective, name)
        })
    }

    /// Draw candidates until one fits, then fall back to truncating the last one.
    pub fn generate_from(mut candidate: impl FnMut() -> String) -> Self {
        let mut last = String::new();
        for attempt in 1..=MAX_ATTEMPTS {
            let name = normalize(&candidate());
            if !name.is_empty() && name.len() < MAX_IDENTITY_LEN && !is_reserved(&name) {
                return Self(name);
            }
            debug!("Discarding candidate '{}' (attempt {})", name, attempt);
            last = name;
        }
        Self(truncate(&last))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

fn normalize(raw: &str) -> String {
    raw.to_lowercase()
        .chars()
        .map(|c| if c == '_' { '-' } else { c })
        .filter(|c| c.is_ascii_alphanumeric() || *c == '-')
        .collect()
}

fn truncate(name: &str) -> String {
    let cut: String = name.chars().take(MAX_IDENTITY_LEN - 1).collect();
    let trimmed = cut.trim_matches('-');
    if trimmed.is_empty() || is_reserved(trimmed) {
        "bedrock".to_string()
    } else {
        trimmed.to_string()
    }
}

impl fmt::Display for ClusterIdentity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl AsRef<str> for ClusterIdentity {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

impl TryFrom<String> for ClusterIdentity {
    type Error = CoreError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        Self::parse(&value)
    }
}

impl From<ClusterIdentity> for String {
    fn from(identity: ClusterIdentity) -> Self {
        identity.0
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::rngs::StdRng;
    use rand::SeedableRng;

    #[test]
    fn test_generated_names_fit() {
        for _ in 0..500 {
            let identity = ClusterIdentity::generate();
            assert!(identity.as_str().len() < MAX_IDENTITY_LEN);
            assert!(!identity.as_str().contains('_'));
            assert!(ClusterIdentity::parse(identity.as_str()).is_ok());
        }
    }

    #[test]
    fn test_seeded_generation_is_repeatable() {
        let a = ClusterIdentity::generate_with(&mut StdRng::seed_from_u64(7));
        let b = ClusterIdentity::generate_with(&mut StdRng::seed_from_u64(7));
        assert_eq!(a, b);
        assert!(a.as_str().contains('-'));
    }

    #[test]
    fn test_long_candidates_are_retried() {
        let mut calls = 0;
        let identity = ClusterIdentity::generate_from(|| {
            calls += 1;
            if calls < 3 {
                "extraordinarily_longwinded_candidate_name".to_string()
            } else {
                "short_name".to_string()
            }
        });
        assert_eq!(identity.as_str(), "short-name");
        assert_eq!(calls, 3);
    }

    #[test]
    fn test_retry_is_bounded_and_truncates() {
        let mut calls = 0;
        let identity = ClusterIdentity::generate_from(|| {
            calls += 1;
            "abcdefghijklmnopqrstuvwxyzabc_defgh".to_string()
        });
        assert_eq!(calls, MAX_ATTEMPTS);
        assert_eq!(identity.as_str(), "abcdefghijklmnopqrstuvwxyzabc");
        assert_eq!(identity.as_str().len(), MAX_IDENTITY_LEN - 1);
    }

    #[test]
    fn test_truncation_trims_hyphens() {
        let identity =
            ClusterIdentity::generate_from(|| "abcdefghijklmnopqrstuvwxyzab-_xyz".to_string());
        assert_eq!(identity.as_str(), "abcdefghijklmnopqrstuvwxyzab");
    }

    #[test]
    fn test_parse_rejects_invalid_names() {
        assert!(ClusterIdentity::parse("").is_err());
        assert!(ClusterIdentity::parse("Demo").is_err());
        assert!(ClusterIdentity::parse("my_cluster").is_err());
        assert!(ClusterIdentity::parse("-demo").is_err());
        assert!(ClusterIdentity::parse(&"a".repeat(30)).is_err());
        assert!(ClusterIdentity::parse(&"a".repeat(29)).is_ok());
        assert!(ClusterIdentity::parse("demo-1").is_ok());
    }

    #[test]
    fn test_resolve_generates_for_empty_input() {
        let generated = ClusterIdentity::resolve(Some("")).unwrap();
        assert!(!generated.as_str().is_empty());
        assert_eq!(ClusterIdentity::resolve(Some("demo")).unwrap().as_str(), "demo");
        assert!(ClusterIdentity::resolve(None).is_ok());
    }

    #[test]
    fn test_parse_rejects_environment_directory_names() {
        for kind in EnvironmentKind::all() {
            let err = ClusterIdentity::parse(kind.as_str()).unwrap_err();
            assert!(matches!(err, CoreError::InvalidIdentity { .. }));
        }
        assert!(ClusterIdentity::parse("azure-simple-2").is_ok());
    }

    #[test]
    fn test_generation_skips_environment_directory_names() {
        let mut calls = 0;
        let identity = ClusterIdentity::generate_from(|| {
            calls += 1;
            if calls == 1 {
                "azure_common_infra".to_string()
            } else {
                "calm_hopper".to_string()
            }
        });
        assert_eq!(identity.as_str(), "calm-hopper");
        assert_eq!(calls, 2);
    }
}
