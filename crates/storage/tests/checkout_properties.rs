//! Property tests for checkout ordering against in-memory SQLite.

use history_storage::Repository;
use proptest::prelude::*;

fn runtime() -> tokio::runtime::Runtime {
    tokio::runtime::Builder::new_current_thread()
        .enable_all()
        .build()
        .unwrap()
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(16))]

    #[test]
    fn n_checkouts_list_n_records_in_order(n in 0usize..12) {
        let (stamps, history) = runtime().block_on(async {
            let repo = Repository::in_memory().await.unwrap();
            let mut stamps = Vec::with_capacity(n);
            for _ in 0..n {
                stamps.push(repo.record_checkout().await.unwrap());
            }
            let history = repo.list_history().await.unwrap();
            repo.close().await;
            (stamps, history)
        });

        prop_assert_eq!(history.len(), n);
        for (i, record) in history.iter().enumerate() {
            prop_assert_eq!(record.id, i as i64 + 1);
            prop_assert_eq!(record.timestamp, stamps[i]);
        }
        prop_assert!(history.windows(2).all(|w| w[0].id < w[1].id));
    }
}
