// Export components
pub mod google_auth;
pub mod google_calendar;
pub mod notifications;
pub mod token_store;
pub mod window;

// Re-export the handles the service wires together
pub use google_auth::GoogleAuthService;
pub use google_calendar::GoogleCalendarHandle;
pub use notifications::NotificationScheduler;
pub use token_store::TokenStore;
pub use window::WindowManager;
