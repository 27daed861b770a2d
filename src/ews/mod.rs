pub mod client;
pub mod envelope;
pub mod extract;
pub mod request;

#[cfg(test)]
pub(crate) mod fixtures;

pub const SOAP_NS: &str = "http://schemas.xmlsoap.org/soap/envelope/";
pub const MESSAGES_NS: &str = "http://schemas.microsoft.com/exchange/services/2006/messages";
pub const TYPES_NS: &str = "http://schemas.microsoft.com/exchange/services/2006/types";

/// Value of `m:ResponseCode` for a successful response message.
pub const NO_ERROR: &str = "NoError";
