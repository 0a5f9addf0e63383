//! Property tests for the bounded parallel mapper.
//!
//! Checks the ordering and aggregation contracts over arbitrary input
//! sizes, concurrency limits, and failure masks.

use paceline::{parallel, ParallelError};
use proptest::prelude::*;

fn runtime() -> tokio::runtime::Runtime {
    tokio::runtime::Builder::new_current_thread()
        .enable_time()
        .build()
        .expect("test runtime")
}

proptest! {
    #[test]
    fn prop_parallel_matches_sequential_map(
        inputs in proptest::collection::vec(any::<u32>(), 0..64),
        limit in 1usize..8,
    ) {
        let expected: Vec<u64> = inputs.iter().map(|&n| u64::from(n) * 3).collect();
        let actual = runtime()
            .block_on(parallel(limit, inputs, |n| async move {
                Ok::<_, String>(u64::from(n) * 3)
            }))
            .unwrap();
        prop_assert_eq!(actual, expected);
    }

    #[test]
    fn prop_parallel_aggregates_every_failure_in_input_order(
        inputs in proptest::collection::vec(any::<u32>(), 0..64),
        limit in 1usize..8,
    ) {
        let expected_failures: Vec<String> = inputs
            .iter()
            .filter(|&&n| n % 5 == 0)
            .map(|n| format!("bad {n}"))
            .collect();
        let expected_values: Vec<u32> = inputs.iter().copied().filter(|n| n % 5 != 0).collect();

        let result = runtime().block_on(parallel(limit, inputs, |n| async move {
            if n % 5 == 0 {
                Err(format!("bad {n}"))
            } else {
                Ok(n)
            }
        }));

        match result {
            Ok(values) => {
                prop_assert!(expected_failures.is_empty());
                prop_assert_eq!(values, expected_values);
            }
            Err(ParallelError::Aggregate(agg)) => {
                prop_assert!(!expected_failures.is_empty());
                let messages: Vec<String> = agg
                    .errors()
                    .iter()
                    .filter_map(|caught| caught.as_error().cloned())
                    .collect();
                prop_assert_eq!(messages, expected_failures);
            }
            Err(other) => prop_assert!(false, "unexpected failure kind: {other}"),
        }
    }
}
