use snafu::Snafu;

pub type Result<T, E = Error> = std::result::Result<T, E>;

#[derive(Debug, Clone, PartialEq, Eq, Snafu)]
#[snafu(visibility(pub))]
pub enum Error {
    /// Required attribute absent from a tensor's attribute bag.
    #[snafu(display("missing attribute {key:?} on tensor {tensor:?}"))]
    MissingAttr { tensor: String, key: String },

    /// Attribute present but carrying the wrong value kind.
    #[snafu(display("attribute {key:?} on tensor {tensor:?}: expected {expected}, found {found}"))]
    AttrType { tensor: String, key: String, expected: &'static str, found: &'static str },
}
