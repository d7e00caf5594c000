use thiserror::Error;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum PriceError {
    #[error("Price cannot be empty")]
    Empty,
    #[error("Invalid price format: {0}")]
    InvalidFormat(String),
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ItemError {
    #[error("Product name cannot be empty")]
    MissingName,
    #[error("Product name must be at least 2 characters")]
    NameTooShort,
    #[error("Product name too long (max 200 characters)")]
    NameTooLong,
    #[error("Price must be positive")]
    NonPositivePrice,
    #[error("Price too high (max $1,000,000)")]
    PriceTooHigh,
    #[error(transparent)]
    Price(#[from] PriceError),
}

#[derive(Debug, Error)]
pub enum ImportError {
    #[error("File is empty")]
    Empty,
    #[error("Could not find name/product column. Expected columns like: name, product_name, item_name")]
    MissingNameColumn,
    #[error("Could not find price column. Expected columns like: price, cost, amount")]
    MissingPriceColumn,
    #[error("File contains no data rows")]
    NoRows,
    #[error("File processing errors:\n{0}")]
    Rows(String),
    #[error("Validation errors:\n{0}")]
    Validation(String),
    #[error("No valid items found in file")]
    NoItems,
    #[error(transparent)]
    Csv(#[from] csv::Error),
}
