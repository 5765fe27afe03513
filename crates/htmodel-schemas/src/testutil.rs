//! Shared proptest strategies for schema tests.

use proptest::prelude::*;

use crate::IpcModel;

/// Strategy for finite, non-negative IPC coefficients.
pub fn arb_ipc() -> impl Strategy<Value = f64> {
    0.0f64..8.0
}

/// Strategy for models of either regime.
pub fn arb_ipc_model() -> impl Strategy<Value = IpcModel> {
    prop_oneof![
        arb_ipc().prop_map(|ipc_td1| IpcModel::SingleRegime { ipc_td1 }),
        (arb_ipc(), arb_ipc())
            .prop_map(|(ipc_td1, ipc_td2)| IpcModel::DualRegime { ipc_td1, ipc_td2 }),
    ]
}
