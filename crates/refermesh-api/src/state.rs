//! Application state shared across handlers.

use std::sync::Arc;

use refermesh_auth::AuthService;
use refermesh_core::{
    AgreementService, BrokerService, DisputeService, MatchService, PiiService, ReferralService,
};
use refermesh_db::Database;

/// Shared application state
#[derive(Clone)]
pub struct AppState {
    pub db: Arc<Database>,
    pub auth: AuthService,
    pub referrals: ReferralService,
    pub matches: MatchService,
    pub agreements: AgreementService,
    pub disputes: DisputeService,
    pub brokers: BrokerService,
    pub pii: PiiService,
}

impl AppState {
    pub fn new(db: Arc<Database>, jwt_secret: &str) -> Self {
        let pool = db.pg.clone();
        Self {
            auth: AuthService::new(pool.clone(), jwt_secret),
            referrals: ReferralService::new(pool.clone()),
            matches: MatchService::new(pool.clone()),
            agreements: AgreementService::new(pool.clone()),
            disputes: DisputeService::new(pool.clone()),
            brokers: BrokerService::new(pool.clone()),
            pii: PiiService::new(pool),
            db,
        }
    }
}
