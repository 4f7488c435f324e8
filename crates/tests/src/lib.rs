pub mod fixtures;

#[cfg(test)]
mod auth_tests;
#[cfg(test)]
mod live_tests;
#[cfg(test)]
mod notification_tests;
#[cfg(test)]
mod panic_alert_tests;
