//! Party binding validation.

use std::collections::{BTreeMap, BTreeSet};

use veil_core::{PartyId, ProgramBindings, ProgramParties, Result, VeilError};

/// Check that `bindings` binds exactly the parties `declared` by the program.
///
/// Inputs and outputs are checked separately. The first missing party (in
/// name order) is reported as `UnboundParty`, then the first extra one as
/// `UnknownParty`.
pub fn validate_bindings(declared: &ProgramParties, bindings: &ProgramBindings) -> Result<()> {
    check_side(&declared.inputs, &bindings.input_parties)?;
    check_side(&declared.outputs, &bindings.output_parties)
}

fn check_side(declared: &BTreeSet<String>, bound: &BTreeMap<String, PartyId>) -> Result<()> {
    if let Some(name) = declared.iter().find(|name| !bound.contains_key(*name)) {
        return Err(VeilError::UnboundParty { name: name.clone() });
    }
    if let Some(name) = bound.keys().find(|name| !declared.contains(*name)) {
        return Err(VeilError::UnknownParty { name: name.clone() });
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use veil_core::{ProgramId, UserId};

    fn party(id: &str) -> PartyId {
        PartyId(id.to_string())
    }

    fn bindings() -> ProgramBindings {
        ProgramBindings::new(ProgramId::new(&UserId("owner".to_string()), "vote"))
    }

    #[test]
    fn test_exact_cover_passes() {
        let declared = ProgramParties::new().input("A").input("B").output("A");
        let bound = bindings()
            .input("A", party("p1"))
            .input("B", party("p2"))
            .output("A", party("p1"));

        assert!(validate_bindings(&declared, &bound).is_ok());
    }

    #[test]
    fn test_missing_input_party() {
        let declared = ProgramParties::new().input("A").input("B");
        let bound = bindings().input("A", party("p1"));

        match validate_bindings(&declared, &bound) {
            Err(VeilError::UnboundParty { name }) => assert_eq!(name, "B"),
            other => panic!("unexpected {:?}", other),
        }
    }

    #[test]
    fn test_missing_output_party() {
        let declared = ProgramParties::new().input("A").output("A");
        let bound = bindings().input("A", party("p1"));

        assert!(matches!(
            validate_bindings(&declared, &bound),
            Err(VeilError::UnboundParty { name }) if name == "A"
        ));
    }

    #[test]
    fn test_undeclared_party() {
        let declared = ProgramParties::new().input("A");
        let bound = bindings().input("A", party("p1")).input("Z", party("p9"));

        assert!(matches!(
            validate_bindings(&declared, &bound),
            Err(VeilError::UnknownParty { name }) if name == "Z"
        ));
    }

    #[test]
    fn test_input_binding_does_not_cover_output() {
        let declared = ProgramParties::new().output("A");
        let bound = bindings().input("A", party("p1"));

        assert!(matches!(
            validate_bindings(&declared, &bound),
            Err(VeilError::UnknownParty { .. })
        ));
    }
}
