// 把所有範例綁到同一個 endpoint

pub mod services;

use crate::adapters::stubs::ExternalClients;
use crate::config::toml_config::ServicesConfig;
use crate::core::Endpoint;
use crate::domain::ports::ObjectStore;
use services::*;
use std::sync::Arc;

pub fn build_endpoint<S>(clients: &ExternalClients, storage: S, settings: &ServicesConfig) -> Endpoint
where
    S: ObjectStore + 'static,
{
    let storage = Arc::new(storage);

    Endpoint::builder()
        // basics
        .bind(GreeterObject)
        .bind(SubscriptionService::new(
            clients.payments.clone(),
            clients.subscriptions.clone(),
        ))
        .bind(SignupWorkflow::new(clients.users.clone(), clients.email.clone()))
        // orchestration tour
        .bind(ParallelSubscriptionService::new(
            clients.payments.clone(),
            clients.subscriptions.clone(),
        ))
        .bind(SubscriptionSaga::new(
            clients.payments.clone(),
            clients.subscriptions.clone(),
        ))
        .bind(Payments::new(clients.payments.clone()))
        .bind(PaymentsWithTimeout::new(
            clients.payments.clone(),
            settings.payment_timeout(),
        ))
        .bind(ConcertTicketingService)
        .bind(PaymentService::new(clients.payments.clone()))
        .bind(EmailService::new(clients.email.clone()))
        // ticket tour
        .bind(CartObject::new(settings.reservation_ttl()))
        .bind(TicketObject)
        .bind(CheckoutService::new(
            clients.payments.clone(),
            clients.email.clone(),
        ))
        // patterns
        .bind(Account::new())
        .bind(PaymentProcessor::new(settings.payment_expiry()))
        .bind(UserFeed::new(
            clients.moderation.clone(),
            settings.poll_interval(),
        ))
        .bind(UserUpdatesService::new(
            clients.users.clone(),
            settings.poll_interval(),
        ))
        .bind(ImageProcessingWorkflow::new(settings.image_output_dir.clone()))
        .bind(PuppeteerService::new(storage.clone()))
        .bind(TransformerService::new(storage))
        .build()
}
