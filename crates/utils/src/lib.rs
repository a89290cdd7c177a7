use rand::distributions::Alphanumeric;
use rand::{thread_rng, Rng};

/// Short random alphanumeric suffix for transport-level identifiers that
/// need uniqueness but carry no meaning.
pub fn random_suffix(len: usize) -> String {
    thread_rng()
        .sample_iter(&Alphanumeric)
        .take(len)
        .map(char::from)
        .collect()
}
