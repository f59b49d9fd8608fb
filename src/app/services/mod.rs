pub mod accounts;
pub mod cart;
pub mod checkout;
pub mod concurrent;
pub mod greeter;
pub mod image_workflow;
pub mod payment_processor;
pub mod payments;
pub mod saga;
pub mod signup;
pub mod subscription;
pub mod ticket;
pub mod ticketing;
pub mod user_feed;
pub mod user_updates;

pub use accounts::Account;
pub use cart::CartObject;
pub use checkout::CheckoutService;
pub use concurrent::ParallelSubscriptionService;
pub use greeter::GreeterObject;
pub use image_workflow::{ImageProcessingWorkflow, PuppeteerService, TransformerService};
pub use payment_processor::PaymentProcessor;
pub use payments::{Payments, PaymentsWithTimeout};
pub use saga::SubscriptionSaga;
pub use signup::SignupWorkflow;
pub use subscription::SubscriptionService;
pub use ticket::TicketObject;
pub use ticketing::{ConcertTicketingService, EmailService, PaymentService};
pub use user_feed::UserFeed;
pub use user_updates::UserUpdatesService;
