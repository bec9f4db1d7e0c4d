//! Property-based tests over randomized batch sizes and override
//! parameters, checking invariants that must hold regardless of how the
//! computation is chunked.

use lcs35::session::Session;
use proptest::prelude::*;
use rug::Integer;

fn small_session() -> Session {
    let mut session = Session::new();
    session.t = 200;
    session
}

proptest! {
    /// Splitting the same total amount of work into arbitrary batch sizes
    /// produces the same final `w`, as long as every batch fully lands
    /// inside `[0, t]`.
    #[test]
    fn work_result_is_independent_of_batching(batches in prop::collection::vec(1u64..=17, 1..20)) {
        let mut stepwise = small_session();
        for amount in &batches {
            stepwise.work(*amount);
        }

        let mut reference = small_session();
        while reference.i < reference.t {
            reference.work(1);
        }
        // only compare up to however far `stepwise` got (it may have
        // reached t before `batches` is exhausted)
        let mut truncated_reference = small_session();
        while truncated_reference.i < stepwise.i {
            truncated_reference.work(1);
        }
        prop_assert_eq!(stepwise.w.clone(), truncated_reference.w);
    }

    /// `work` never advances `i` past `t`, regardless of the requested
    /// amount.
    #[test]
    fn work_never_overshoots_t(amount in 0u64..10_000) {
        let mut session = small_session();
        session.work(amount);
        prop_assert!(session.i <= session.t);
    }

    /// The consistency check holds after any sequence of valid `work`
    /// calls, and a single-limb corruption of `w` always trips it.
    #[test]
    fn consistency_check_detects_any_single_limb_corruption(
        steps in prop::collection::vec(1u64..=13, 1..10),
        corruption in 1u32..=u32::MAX,
    ) {
        let mut session = small_session();
        for amount in steps {
            session.work(amount);
        }
        prop_assert!(session.check());

        session.w += Integer::from(corruption);
        prop_assert!(!session.check());
    }

    /// `isafter` agrees with direct comparison of `i` for two sessions
    /// sharing the same parameters.
    #[test]
    fn isafter_matches_i_comparison(a_amount in 0u64..150, b_amount in 0u64..150) {
        let mut a = small_session();
        a.work(a_amount);
        let mut b = small_session();
        b.work(b_amount);

        prop_assert_eq!(a.isafter(&b), a.i <= b.i);
    }
}
