pub mod instructions;
pub mod processor;
pub mod reference;
pub mod sms;

pub use processor::PaymentProcessor;
pub use reference::ReferenceCodeGenerator;
pub use sms::{gateway_from_config, HttpSmsGateway, LogSmsGateway, SmsGateway};
