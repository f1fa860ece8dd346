use anyhow::Result;
use std::sync::mpsc::{self, Receiver, Sender};
use std::thread;

use crate::api::{ApiClient, Transport};
use crate::error::ApiError;
use crate::models::{ListingFilter, ListingPage};
use crate::search::{FavoriteAction, FetchRequest, ListingSearchController};

/// Remote work the browse screen hands off so the UI thread never blocks.
#[derive(Debug, Clone)]
pub enum Job {
    List(FetchRequest),
    CreateFavorite(ListingFilter),
    ToggleFavorite(i64),
}

impl From<FavoriteAction> for Job {
    fn from(action: FavoriteAction) -> Self {
        match action {
            FavoriteAction::Toggle(id) => Job::ToggleFavorite(id),
            FavoriteAction::Create(filter) => Job::CreateFavorite(filter),
        }
    }
}

#[derive(Debug)]
pub enum Outcome {
    Page(FetchRequest, Result<ListingPage, ApiError>),
    FavoriteCreated(Result<i64, ApiError>),
    FavoriteToggled(Result<bool, ApiError>),
}

pub fn execute<T: Transport>(api: &ApiClient<T>, job: Job) -> Outcome {
    match job {
        Job::List(request) => {
            let result = api.list_items(&request.params);
            Outcome::Page(request, result)
        }
        Job::CreateFavorite(filter) => Outcome::FavoriteCreated(api.create_favorite_filter(&filter)),
        Job::ToggleFavorite(id) => Outcome::FavoriteToggled(api.toggle_favorite_filter(id)),
    }
}

/// Feeds an outcome back into the controller; returns the follow-up job, if any.
pub fn apply(controller: &mut ListingSearchController, outcome: Outcome) -> Option<Job> {
    match outcome {
        Outcome::Page(request, result) => {
            controller.apply_page(&request, result);
            None
        }
        Outcome::FavoriteCreated(result) => controller.apply_favorite_created(result).map(Job::from),
        Outcome::FavoriteToggled(result) => {
            controller.apply_favorite_toggled(result);
            None
        }
    }
}

/// One background thread running jobs in submission order.
pub struct FetchWorker {
    jobs: Sender<Job>,
    outcomes: Receiver<Outcome>,
}

impl FetchWorker {
    pub fn spawn<T: Transport + Send + 'static>(api: ApiClient<T>) -> Result<Self> {
        let (job_tx, job_rx) = mpsc::channel::<Job>();
        let (outcome_tx, outcome_rx) = mpsc::channel();

        // Detached: a hung request must not hold up quitting.
        thread::Builder::new()
            .name("finder-fetch".to_string())
            .spawn(move || {
                for job in job_rx {
                    tracing::debug!("Running {:?}", job);
                    if outcome_tx.send(execute(&api, job)).is_err() {
                        break;
                    }
                }
                tracing::debug!("Fetch worker stopped");
            })?;

        Ok(Self {
            jobs: job_tx,
            outcomes: outcome_rx,
        })
    }

    pub fn submit(&self, job: impl Into<Job>) {
        if self.jobs.send(job.into()).is_err() {
            tracing::error!("Fetch worker is gone, dropping job");
        }
    }

    pub fn try_recv(&self) -> Option<Outcome> {
        self.outcomes.try_recv().ok()
    }
}

impl From<FetchRequest> for Job {
    fn from(request: FetchRequest) -> Self {
        Job::List(request)
    }
}
