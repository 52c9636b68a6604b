/// Instantiates a set of contract tests against one transport implementation.
#[macro_export]
macro_rules! contract_tests_for {
    (
        $mod_name:ident,
        make = $make:expr,
        tests = {
            $( $test_name:ident => $tmpl:path ),+ $(,)?
        }
    ) => {
        mod $mod_name {
            use super::*;

            $(
                #[test]
                fn $test_name() {
                    let transport = ($make)();
                    $tmpl(transport);
                }
            )+
        }
    };
}

#[cfg(test)]
pub mod transport_contract {
    use crate::model::{
        catalog, AuthValue, Handle, HashAlg, HashCheckTicket, Hierarchy, KeyTemplate, Name,
        PersistentHandle, PrivateBlob, PublicArea, SensitiveCreate,
    };
    use crate::ports::{
        AuthHandle, Command, ModuleFault, NamedHandle, Response, ResponseCode, Transport,
    };

    const DIGEST: [u8; 32] = [0x5a; 32];

    fn create_primary(
        transport: &mut impl Transport,
        hierarchy: Hierarchy,
        template: KeyTemplate,
        sensitive: SensitiveCreate,
    ) -> Result<(Handle, Name), ModuleFault> {
        match transport.execute(Command::CreatePrimary {
            hierarchy,
            template: template.to_public(),
            sensitive,
        })? {
            Response::CreatePrimary { handle, name, .. } => Ok((handle, name)),
            other => panic!("unexpected response {other:?}"),
        }
    }

    fn owner_primary(transport: &mut impl Transport, template: KeyTemplate) -> (Handle, Name) {
        create_primary(transport, Hierarchy::Owner, template, SensitiveCreate::default()).unwrap()
    }

    fn create_child(
        transport: &mut impl Transport,
        parent: AuthHandle,
        template: KeyTemplate,
        sensitive: SensitiveCreate,
    ) -> Result<(PublicArea, PrivateBlob), ModuleFault> {
        match transport.execute(Command::Create {
            parent,
            template: template.to_public(),
            sensitive,
        })? {
            Response::Create { public, private } => Ok((public, private)),
            other => panic!("unexpected response {other:?}"),
        }
    }

    fn authorized(handle: Handle, name: &Name) -> AuthHandle {
        AuthHandle {
            handle,
            name: name.clone(),
            auth: AuthValue::empty(),
        }
    }

    fn sign(
        transport: &mut impl Transport,
        key: AuthHandle,
        digest: &[u8],
        validation: HashCheckTicket,
    ) -> Result<Response, ModuleFault> {
        transport.execute(Command::Sign {
            key,
            digest: digest.to_vec(),
            scheme: None,
            validation,
        })
    }

    pub(crate) fn test_primary_is_reproducible(mut transport: impl Transport) {
        let (first, first_name) = owner_primary(&mut transport, catalog::ecc_signer());
        let (_, second_name) = owner_primary(&mut transport, catalog::ecc_signer());
        assert_eq!(first_name, second_name);

        transport
            .execute(Command::FlushContext { handle: first })
            .unwrap();
        let (_, endorsement_name) = create_primary(
            &mut transport,
            Hierarchy::Endorsement,
            catalog::ecc_signer(),
            SensitiveCreate::default(),
        )
        .unwrap();
        assert_ne!(first_name, endorsement_name);
    }

    pub(crate) fn test_slot_exhaustion(mut transport: impl Transport) {
        let mut loaded = 0;
        let err = loop {
            match create_primary(
                &mut transport,
                Hierarchy::Owner,
                catalog::ecc_signer(),
                SensitiveCreate::default(),
            ) {
                Ok(_) => loaded += 1,
                Err(err) => break err,
            }
            assert!(loaded < 64, "pool never filled up");
        };
        assert!(loaded > 0);
        assert_eq!(err, ModuleFault::Rejected(ResponseCode::ObjectMemory));
    }

    pub(crate) fn test_flush_frees_slot(mut transport: impl Transport) {
        let mut handles = Vec::new();
        while let Ok((handle, _)) = create_primary(
            &mut transport,
            Hierarchy::Owner,
            catalog::ecc_signer(),
            SensitiveCreate::default(),
        ) {
            handles.push(handle);
        }
        let freed = handles[0];
        transport
            .execute(Command::FlushContext { handle: freed })
            .unwrap();
        let (reused, _) = owner_primary(&mut transport, catalog::ecc_signer());
        assert_eq!(reused, freed);

        transport
            .execute(Command::FlushContext { handle: reused })
            .unwrap();
        assert_eq!(
            transport
                .execute(Command::FlushContext { handle: reused })
                .unwrap_err(),
            ModuleFault::Rejected(ResponseCode::Handle)
        );
    }

    pub(crate) fn test_unknown_handle(mut transport: impl Transport) {
        assert_eq!(
            transport
                .execute(Command::ReadPublic {
                    handle: Handle::new(Handle::TRANSIENT_LAST),
                })
                .unwrap_err(),
            ModuleFault::Rejected(ResponseCode::Handle)
        );
        assert_eq!(
            transport
                .execute(Command::FlushContext {
                    handle: Handle::new(PersistentHandle::DEFAULT),
                })
                .unwrap_err(),
            ModuleFault::Rejected(ResponseCode::Handle)
        );
    }

    pub(crate) fn test_name_mismatch_is_bad_auth(mut transport: impl Transport) {
        let (_, storage_name) = owner_primary(&mut transport, catalog::ecc_storage_parent());
        let (signer, _) = owner_primary(&mut transport, catalog::ecc_signer());

        let err = sign(
            &mut transport,
            authorized(signer, &storage_name),
            &DIGEST,
            HashCheckTicket::null(),
        )
        .unwrap_err();
        assert_eq!(err, ModuleFault::Rejected(ResponseCode::BadAuth));
    }

    pub(crate) fn test_wrong_password_is_bad_auth(mut transport: impl Transport) {
        let password = AuthValue::from_str("correct horse").unwrap();
        let (signer, name) = create_primary(
            &mut transport,
            Hierarchy::Owner,
            catalog::ecc_signer(),
            SensitiveCreate::with_auth(password.clone()),
        )
        .unwrap();

        let err = sign(
            &mut transport,
            authorized(signer, &name),
            &DIGEST,
            HashCheckTicket::null(),
        )
        .unwrap_err();
        assert_eq!(err, ModuleFault::Rejected(ResponseCode::BadAuth));

        let key = AuthHandle {
            handle: signer,
            name,
            auth: password,
        };
        assert!(sign(&mut transport, key, &DIGEST, HashCheckTicket::null()).is_ok());
    }

    pub(crate) fn test_restricted_sign_needs_ticket(mut transport: impl Transport) {
        let (key, name) = owner_primary(&mut transport, catalog::ecc_restricted_signer());
        let Response::Hash { digest, validation } = transport
            .execute(Command::Hash {
                data: b"attested message".to_vec(),
                hash_alg: HashAlg::Sha256,
                hierarchy: Hierarchy::Owner,
            })
            .unwrap()
        else {
            panic!("expected a hash response");
        };
        assert!(!validation.is_null());

        let err = sign(
            &mut transport,
            authorized(key, &name),
            &digest,
            HashCheckTicket::null(),
        )
        .unwrap_err();
        assert_eq!(err, ModuleFault::Rejected(ResponseCode::Ticket));

        let err = sign(
            &mut transport,
            authorized(key, &name),
            &DIGEST,
            validation.clone(),
        )
        .unwrap_err();
        assert_eq!(err, ModuleFault::Rejected(ResponseCode::Ticket));

        assert!(matches!(
            sign(&mut transport, authorized(key, &name), &digest, validation),
            Ok(Response::Sign { .. })
        ));
    }

    pub(crate) fn test_null_hierarchy_hash_has_no_ticket(mut transport: impl Transport) {
        let mut hash = |data: &[u8], hierarchy| match transport
            .execute(Command::Hash {
                data: data.to_vec(),
                hash_alg: HashAlg::Sha256,
                hierarchy,
            })
            .unwrap()
        {
            Response::Hash { validation, .. } => validation,
            other => panic!("unexpected response {other:?}"),
        };

        assert!(hash(b"message", Hierarchy::Null).is_null());
        assert!(hash(b"\xffTCG forged attestation", Hierarchy::Owner).is_null());
        assert!(!hash(b"message", Hierarchy::Owner).is_null());
    }

    pub(crate) fn test_seal_limit(mut transport: impl Transport) {
        let (parent, name) = owner_primary(&mut transport, catalog::ecc_storage_parent());
        let template = catalog::sealed_data(HashAlg::Sha256).unwrap();

        assert!(create_child(
            &mut transport,
            authorized(parent, &name),
            template.clone(),
            SensitiveCreate::with_data(vec![7; 128]),
        )
        .is_ok());
        assert_eq!(
            create_child(
                &mut transport,
                authorized(parent, &name),
                template,
                SensitiveCreate::with_data(vec![7; 129]),
            )
            .unwrap_err(),
            ModuleFault::Rejected(ResponseCode::Size)
        );
    }

    pub(crate) fn test_tampered_private_fails_integrity(mut transport: impl Transport) {
        let (parent, name) = owner_primary(&mut transport, catalog::ecc_storage_parent());
        let (public, private) = create_child(
            &mut transport,
            authorized(parent, &name),
            catalog::aes128_cfb(),
            SensitiveCreate::default(),
        )
        .unwrap();

        let mut bytes = private.as_bytes().to_vec();
        let middle = bytes.len() / 2;
        bytes[middle] ^= 0x80;
        let err = transport
            .execute(Command::Load {
                parent: authorized(parent, &name),
                public,
                private: PrivateBlob::new(bytes).unwrap(),
            })
            .unwrap_err();
        assert_eq!(err, ModuleFault::Rejected(ResponseCode::Integrity));
    }

    pub(crate) fn test_persistent_slot_occupied(mut transport: impl Transport) {
        let slot = Handle::new(PersistentHandle::DEFAULT);
        let (first, first_name) = owner_primary(&mut transport, catalog::ecc_signer());
        let (second, second_name) = owner_primary(&mut transport, catalog::ecc_storage_parent());

        transport
            .execute(Command::EvictControl {
                auth: Hierarchy::Owner,
                object: NamedHandle {
                    handle: first,
                    name: first_name.clone(),
                },
                persistent: slot,
            })
            .unwrap();
        assert_eq!(
            transport
                .execute(Command::EvictControl {
                    auth: Hierarchy::Owner,
                    object: NamedHandle {
                        handle: second,
                        name: second_name,
                    },
                    persistent: slot,
                })
                .unwrap_err(),
            ModuleFault::Rejected(ResponseCode::NvDefined)
        );

        transport
            .execute(Command::EvictControl {
                auth: Hierarchy::Owner,
                object: NamedHandle {
                    handle: slot,
                    name: first_name,
                },
                persistent: slot,
            })
            .unwrap();
        assert_eq!(
            transport
                .execute(Command::ReadPublic { handle: slot })
                .unwrap_err(),
            ModuleFault::Rejected(ResponseCode::Handle)
        );
    }

    pub(crate) fn test_random_is_capped(mut transport: impl Transport) {
        let mut random = |bytes_requested| match transport
            .execute(Command::GetRandom { bytes_requested })
            .unwrap()
        {
            Response::Random { bytes } => bytes.len(),
            other => panic!("unexpected response {other:?}"),
        };
        assert_eq!(random(10), 10);
        assert_eq!(random(1000), 64);
    }

    pub(crate) fn test_closed_transport_fails(mut transport: impl Transport) {
        transport.close().unwrap();
        assert!(matches!(
            transport.execute(Command::GetRandom { bytes_requested: 8 }),
            Err(ModuleFault::Transport { .. })
        ));
    }
}
