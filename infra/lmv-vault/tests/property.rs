use lmv_vault::{Domain, Vault};
use proptest::prelude::*;
use serde_json::json;

proptest! {
    #![proptest_config(ProptestConfig::with_cases(32))]

    #[test]
    fn roundtrip_arbitrary_strings_across_domains(value in ".{0,256}", aad_key in ".{0,64}") {
        let vault = Vault::builder().passphrase("property-test-passphrase").build().unwrap();
        let payload = json!({ "value": value });
        let aad = json!({ "memory_key": aad_key });

        let vault_envelope = vault.encrypt(&payload, Domain::Vault, &aad).unwrap();
        let (decoded, decoded_aad) = vault.decrypt(&vault_envelope, Domain::Vault).unwrap();
        prop_assert_eq!(&decoded, &payload);
        prop_assert_eq!(&decoded_aad, &aad);

        let ledger_envelope = vault.encrypt(&payload, Domain::Ledger, &aad).unwrap();
        let (decoded, _) = vault.decrypt(&ledger_envelope, Domain::Ledger).unwrap();
        prop_assert_eq!(decoded, payload);
    }
}
