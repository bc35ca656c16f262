use somnia_runtime::*;
use somnia_types::{Address, Amount, RegistryEvent, VoucherId};
use std::sync::Arc;

fn account(byte: u8) -> Address {
    Address([byte; 20])
}

fn config() -> RuntimeConfig {
    RuntimeConfig::from_toml_str(
        r#"
        chain_id = 50312
        event_capacity = 16

        [[genesis]]
        address = "0x0a0a0a0a0a0a0a0a0a0a0a0a0a0a0a0a0a0a0a0a"
        balance = "5"
        "#,
    )
    .unwrap()
}

#[tokio::test]
async fn subscribers_receive_events_in_commit_order() {
    let runtime = Runtime::genesis(config(), Arc::new(SystemClock)).unwrap();
    let mut events = runtime.subscribe();
    let a = account(0x0a);
    let id = VoucherId::derive(b"gift");

    runtime
        .execute(&Transaction::new(
            a,
            Call::RegisterName {
                name: "gifts.somnia".into(),
            },
        ))
        .unwrap();
    // reverted calls emit nothing
    assert!(runtime
        .execute(&Transaction::new(
            a,
            Call::RegisterName {
                name: "nope".into()
            }
        ))
        .is_err());
    runtime
        .execute(
            &Transaction::new(a, Call::CreateVoucher { voucher_id: id })
                .with_value(Amount::from_tokens(2)),
        )
        .unwrap();

    let first = events.recv().await.unwrap();
    assert_eq!(first.height, 1);
    assert_eq!(first.event.name(), "NameRegistered");

    let second = events.recv().await.unwrap();
    assert_eq!(second.height, 2);
    assert_eq!(
        second.event,
        RegistryEvent::VoucherCreated {
            voucher_id: id,
            amount: Amount::from_tokens(2),
            creator: a,
        }
    );
    assert!(events.try_recv().is_err());
}

#[test]
fn snapshot_survives_a_disk_roundtrip() {
    let clock = Arc::new(ManualClock::new(1_700_000_000));
    let runtime = Runtime::genesis(config(), clock.clone()).unwrap();
    let a = account(0x0a);
    let id = VoucherId::derive(b"persisted");

    runtime
        .execute(&Transaction::new(
            a,
            Call::RegisterName {
                name: "saved.somnia".into(),
            },
        ))
        .unwrap();
    runtime
        .execute(
            &Transaction::new(a, Call::CreateVoucher { voucher_id: id })
                .with_value(Amount::parse_tokens("1.25").unwrap()),
        )
        .unwrap();

    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("state.json");
    std::fs::write(&path, serde_json::to_vec_pretty(&runtime.snapshot()).unwrap()).unwrap();

    let snapshot: WorldSnapshot =
        serde_json::from_slice(&std::fs::read(&path).unwrap()).unwrap();
    assert_eq!(snapshot, runtime.snapshot());
    let restored = Runtime::from_snapshot(config(), snapshot, clock).unwrap();

    assert_eq!(restored.height(), 2);
    assert_eq!(restored.resolve_name("saved.somnia").unwrap(), a);
    assert_eq!(restored.get_owner_names(&a), vec!["saved.somnia".to_string()]);
    assert_eq!(
        restored.get_voucher_amount(&id),
        Amount::parse_tokens("1.25").unwrap()
    );
    assert_eq!(restored.escrow_balance(), Amount::parse_tokens("1.25").unwrap());
    assert_eq!(
        restored.balance_of(&a),
        Amount::parse_tokens("3.75").unwrap()
    );

    restored
        .execute(&Transaction::new(account(0x0b), Call::RedeemVoucher { voucher_id: id }))
        .unwrap();
    assert!(restored.get_voucher_status(&id).redeemed);
    assert_eq!(restored.height(), 3);
}
