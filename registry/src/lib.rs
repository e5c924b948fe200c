use std::sync::Arc;

use adapter::database::ConnectionPool;
use adapter::payment::PaymentGatewayImpl;
use adapter::repository::health::HealthCheckRepositoryImpl;
use adapter::repository::reservation::ReservationRepositoryImpl;
use kernel::gateway::payment::PaymentGateway;
use kernel::repository::health::HealthCheckRepository;
use kernel::repository::reservation::ReservationRepository;
use kernel::service::booking::BookingOrchestrator;
use kernel::service::payment::PaymentIntentCoordinator;
use shared::config::AppConfig;
use shared::error::AppResult;

#[derive(Clone)]
pub struct AppRegistry {
    health_check_repository: Arc<dyn HealthCheckRepository>,
    reservation_repository: Arc<dyn ReservationRepository>,
    payment_gateway: Arc<dyn PaymentGateway>,
    booking_orchestrator: Arc<BookingOrchestrator>,
}

impl AppRegistry {
    pub fn new(pool: ConnectionPool, app_config: &AppConfig) -> AppResult<Self> {
        let health_check_repository = Arc::new(HealthCheckRepositoryImpl::new(pool.clone()));
        let reservation_repository: Arc<dyn ReservationRepository> =
            Arc::new(ReservationRepositoryImpl::new(pool.clone()));
        let payment_gateway: Arc<dyn PaymentGateway> =
            Arc::new(PaymentGatewayImpl::new(app_config.payment.clone())?);
        let booking_orchestrator = Arc::new(BookingOrchestrator::new(
            reservation_repository.clone(),
            PaymentIntentCoordinator::new(payment_gateway.clone()),
            app_config.payment.currency.clone(),
        ));
        Ok(Self {
            health_check_repository,
            reservation_repository,
            payment_gateway,
            booking_orchestrator,
        })
    }

    pub fn health_check_repository(&self) -> Arc<dyn HealthCheckRepository> {
        self.health_check_repository.clone()
    }

    pub fn reservation_repository(&self) -> Arc<dyn ReservationRepository> {
        self.reservation_repository.clone()
    }

    pub fn payment_gateway(&self) -> Arc<dyn PaymentGateway> {
        self.payment_gateway.clone()
    }

    pub fn booking_orchestrator(&self) -> Arc<BookingOrchestrator> {
        self.booking_orchestrator.clone()
    }
}
