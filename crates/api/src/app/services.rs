//! Service wiring: the typed collections, token codec, and collaborators
//! every handler reaches through `Extension<Arc<AppServices>>`.

use std::sync::Arc;

use trekly_auth::Hs256TokenCodec;
use trekly_core::{DomainResult, TourId};
use trekly_domain::{Booking, RatingStats, Review, Tour, User};
use trekly_store::Collection;

use crate::app::collaborators::{FakePaymentGateway, LoggingMailer, Mailer, PaymentGateway};
use crate::config::Config;

pub struct AppServices {
    pub config: Config,
    pub tours: Collection<Tour>,
    pub users: Collection<User>,
    pub reviews: Collection<Review>,
    pub bookings: Collection<Booking>,
    pub tokens: Hs256TokenCodec,
    pub mailer: Arc<dyn Mailer>,
    pub payments: Arc<dyn PaymentGateway>,
}

/// Default wiring: in-process dev collaborators.
pub fn build_services(config: Config) -> AppServices {
    build_services_with(
        config,
        Arc::new(LoggingMailer),
        Arc::new(FakePaymentGateway),
    )
}

/// Wiring with injected collaborators (tests use a recording mailer).
pub fn build_services_with(
    config: Config,
    mailer: Arc<dyn Mailer>,
    payments: Arc<dyn PaymentGateway>,
) -> AppServices {
    let tokens = Hs256TokenCodec::new(config.jwt_secret.as_bytes(), config.jwt_ttl);
    AppServices {
        tours: Collection::new().with_unique("name", |t: &Tour| Some(t.name.clone())),
        users: Collection::new().with_unique("email", |u: &User| Some(u.email.clone())),
        reviews: Collection::new().with_unique("tour_user", |r: &Review| Some(r.pair_key())),
        bookings: Collection::new(),
        tokens,
        mailer,
        payments,
        config,
    }
}

impl AppServices {
    /// Email lookup honoring the soft-delete scope.
    pub fn find_active_user_by_email(&self, email: &str) -> Option<User> {
        let email = email.trim().to_lowercase();
        self.users.find_one(|u| u.active && u.email == email)
    }

    /// Recompute a tour's rating aggregate from its full review set.
    ///
    /// Runs after every review create/update/delete. Read-then-write without
    /// a transaction; the concurrent-review race window is accepted.
    pub fn recompute_tour_ratings(&self, tour_id: TourId) -> DomainResult<()> {
        let reviews = self.reviews.find(|r| r.tour == tour_id);
        let stats = RatingStats::from_reviews(&reviews);

        let mut tour = self.tours.require(*tour_id.as_uuid())?;
        tour.set_rating_stats(stats.average, stats.quantity);
        self.tours.save(tour)?;
        Ok(())
    }
}
