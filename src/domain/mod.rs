pub mod amount;
pub mod listing;
pub mod transaction;
pub mod view;

pub use listing::{Listing, ListingStatus};
pub use transaction::{OperationKind, PendingTransaction, TxHandle, TxState};
pub use view::AgreementView;
