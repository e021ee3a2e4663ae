//! Reserved identifiers shared by the registry, the filters and the dispatcher.
//!
//! Content is authored against these strings, so they are part of the data
//! contract and must not drift between releases.

// State machine labels ----------------------------------------------------
/// Initial state for every fresh challenge context.
pub const STATE_START: &str = "Start";
/// The only state label the engine treats as terminal.
pub const STATE_SUCCESS: &str = "Success";

// Synthetic events -------------------------------------------------------
/// Event replayed through a session whenever one of its challenges completes.
pub const EVENT_CHALLENGE_COMPLETED: &str = "ChallengeCompleted";
/// Field of the synthetic completion payload carrying the challenge id.
pub const EVENT_FIELD_CHALLENGE_ID: &str = "ChallengeId";

// Challenge tags ---------------------------------------------------------
pub const TAG_GLOBAL: &str = "global";
pub const TAG_ELUSIVE: &str = "elusive";
pub const TAG_ARCADE: &str = "arcade";
pub const TAG_ESCALATION: &str = "escalation";
pub const TAG_PRO1: &str = "pro1";

// Contract types ---------------------------------------------------------
pub const CONTRACT_TYPE_TUTORIAL: &str = "tutorial";
pub const CONTRACT_TYPE_ELUSIVE: &str = "elusive";

// Category ids -----------------------------------------------------------
pub const CATEGORY_FEATS: &str = "feats";
pub const CATEGORY_CLASSIC: &str = "classic";
pub const CATEGORY_ELUSIVE: &str = "elusive";
pub(crate) const CATEGORY_MARKER_FEATURED: &str = "featured";
pub(crate) const CATEGORY_MARKER_ARCADE: &str = "arcade";
pub(crate) const CATEGORY_MARKER_ESCALATION: &str = "escalation";

// Global buckets ---------------------------------------------------------
pub const GLOBAL_FEATURED_LOCATION: &str = "GLOBAL_FEATURED_CHALLENGES";
pub const GLOBAL_ARCADE_LOCATION: &str = "GLOBAL_ARCADE_CHALLENGES";
pub const GLOBAL_ESCALATION_LOCATION: &str = "GLOBAL_ESCALATION_CHALLENGES";
pub const GLOBAL_CLASSIC_LOCATION: &str = "GLOBAL_CLASSIC_CHALLENGES";
pub const GLOBAL_ELUSIVE_LOCATION: &str = "GLOBAL_ELUSIVES_CHALLENGES";

// Engine defaults --------------------------------------------------------
pub(crate) const DEFAULT_GLOBAL_LOCATION: &str = "GLOBAL";
pub(crate) const DEFAULT_MAX_CASCADE_STEPS: usize = 10_000;
