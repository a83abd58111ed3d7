pub mod feature_engineering;
pub mod loader;
pub mod split;

pub use feature_engineering::{
    engineer_features, read_transactions, write_feature_table, CustomerFeatureRow, Transaction,
};
pub use loader::{load_labeled_dataset, LabeledDataset};
pub use split::train_test_split;
