pub mod flow;
pub mod otp;
pub mod token;
