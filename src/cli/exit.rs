/// Run outcome determining exit code.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Outcome {
    /// Every record was hashed (exit 0).
    AllHashed,
    /// Some records skipped, or the run was cut short by its timeout (exit 1).
    Partial,
    /// Bad input, bad config, or pipeline failure (exit 2).
    Refusal,
}

impl Outcome {
    pub fn exit_code(self) -> u8 {
        match self {
            Outcome::AllHashed => 0,
            Outcome::Partial => 1,
            Outcome::Refusal => 2,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::Outcome;

    #[test]
    fn exit_codes_are_stable() {
        assert_eq!(Outcome::AllHashed.exit_code(), 0);
        assert_eq!(Outcome::Partial.exit_code(), 1);
        assert_eq!(Outcome::Refusal.exit_code(), 2);
    }
}
