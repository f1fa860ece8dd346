//! State behind the browse screen: the active filter and tab, per-tab result
//! buckets, pagination, and favorite-filter bookkeeping.
//!
//! The controller never performs I/O. Operations that need the server return
//! a request value; whoever runs it hands the outcome back through the
//! matching `apply_*` method. Every replacing fetch carries a new generation
//! number and outcomes from older generations are dropped, so a late answer
//! for a tab or filter the user already left cannot land in the wrong bucket.

use std::collections::HashMap;

use crate::error::ApiError;
use crate::models::{Category, Item, ListParams, ListingFilter, ListingKind, ListingPage, Location, NavParams, RecencyWindow};

/// How far the list has to scroll past the last trigger before the next page is requested.
pub const SCROLL_FETCH_DELTA: f64 = 500.0;

/// Whether moving from `previous` to `current` covers at least `delta`.
pub fn crosses(previous: f64, current: f64, delta: f64) -> bool {
    current >= previous + delta
}

/// Remembers the scroll offset of the last page trigger.
#[derive(Debug, Clone, PartialEq)]
pub struct ScrollThreshold {
    delta: f64,
    last_fired: f64,
}

impl ScrollThreshold {
    pub fn new(delta: f64) -> Self {
        Self { delta, last_fired: 0.0 }
    }

    pub fn should_fire(&self, offset: f64) -> bool {
        crosses(self.last_fired, offset, self.delta)
    }

    pub fn mark(&mut self, offset: f64) {
        self.last_fired = offset;
    }

    pub fn reset(&mut self) {
        self.last_fired = 0.0;
    }
}

impl Default for ScrollThreshold {
    fn default() -> Self {
        Self::new(SCROLL_FETCH_DELTA)
    }
}

/// Where user-visible failure messages go.
pub trait Notifier {
    fn error(&mut self, message: &str);
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FetchMode {
    /// Page 1; the tab's bucket is replaced.
    Replace,
    /// Next page; appended to the tab's bucket.
    Append,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FetchRequest {
    pub generation: u64,
    pub kind: ListingKind,
    pub mode: FetchMode,
    pub params: ListParams,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FavoriteAction {
    /// Flip the favorite flag of an existing saved filter.
    Toggle(i64),
    /// Save this snapshot as a new favorite filter.
    Create(ListingFilter),
}

/// A single-field edit of the active filter. The listing kind is not here:
/// it follows the active tab.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FilterChange {
    Category(Option<Category>),
    Location(Option<Location>),
    Recency(Option<RecencyWindow>),
    Query(String),
    WithPhoto(bool),
    WithBody(bool),
}

fn replace_if_changed<T: PartialEq>(slot: &mut T, value: T) -> bool {
    if *slot == value {
        false
    } else {
        *slot = value;
        true
    }
}

pub struct ListingSearchController {
    active_tab: ListingKind,
    filter: ListingFilter,
    current_page: u32,
    has_more_pages: bool,
    is_loading: bool,
    is_refreshing: bool,
    results_by_tab: HashMap<ListingKind, Vec<Item>>,
    is_favorited: bool,
    favorite_filter_id: Option<i64>,
    entry_favorite_id: Option<i64>,
    applied_nav_filters: Option<ListingFilter>,
    nav_filters: Option<ListingFilter>,
    nav_favorite_id: Option<i64>,
    favorite_in_flight: bool,
    generation: u64,
    scroll: ScrollThreshold,
    notifier: Box<dyn Notifier>,
}

impl ListingSearchController {
    /// Builds the initial state from the entry parameters. Nothing is fetched
    /// until the first `on_focus`.
    pub fn new(nav: &NavParams, notifier: Box<dyn Notifier>) -> Self {
        let mut filter = nav.filters.clone().unwrap_or_default();
        if let Some(category) = &nav.category {
            filter.category = Some(category.clone());
        }
        if let Some(location) = &nav.location {
            filter.location = Some(location.clone());
        }

        Self {
            active_tab: filter.kind,
            filter,
            current_page: 1,
            has_more_pages: true,
            is_loading: false,
            is_refreshing: false,
            results_by_tab: ListingKind::ALL.iter().map(|kind| (*kind, Vec::new())).collect(),
            is_favorited: false,
            favorite_filter_id: nav.favorite_id,
            entry_favorite_id: nav.favorite_id,
            applied_nav_filters: nav.filters.clone(),
            nav_filters: nav.filters.clone(),
            nav_favorite_id: nav.favorite_id,
            favorite_in_flight: false,
            generation: 0,
            scroll: ScrollThreshold::default(),
            notifier,
        }
    }

    // --- Accessors ---

    pub fn active_tab(&self) -> ListingKind {
        self.active_tab
    }

    pub fn filter(&self) -> &ListingFilter {
        &self.filter
    }

    pub fn current_page(&self) -> u32 {
        self.current_page
    }

    pub fn has_more_pages(&self) -> bool {
        self.has_more_pages
    }

    pub fn is_loading(&self) -> bool {
        self.is_loading
    }

    pub fn is_refreshing(&self) -> bool {
        self.is_refreshing
    }

    pub fn is_favorited(&self) -> bool {
        self.is_favorited
    }

    pub fn favorite_filter_id(&self) -> Option<i64> {
        self.favorite_filter_id
    }

    pub fn bucket(&self, kind: ListingKind) -> &[Item] {
        self.results_by_tab.get(&kind).map(Vec::as_slice).unwrap_or(&[])
    }

    pub fn items(&self) -> &[Item] {
        self.bucket(self.active_tab)
    }

    // --- Fetching ---

    fn issue_replace(&mut self, refreshing: bool) -> FetchRequest {
        self.generation += 1;
        self.current_page = 1;
        self.scroll.reset();
        if refreshing {
            self.is_refreshing = true;
        } else {
            self.is_loading = true;
        }
        tracing::debug!(
            "Fetching page 1 of {} (generation {})",
            self.active_tab.label(),
            self.generation
        );
        FetchRequest {
            generation: self.generation,
            kind: self.active_tab,
            mode: FetchMode::Replace,
            params: ListParams::from_filter(&self.filter, 1),
        }
    }

    /// Reloads the first page of the active tab with the current filter.
    pub fn refresh(&mut self) -> FetchRequest {
        self.issue_replace(false)
    }

    /// User-initiated reload: also forgets that the list was exhausted.
    pub fn pull_to_refresh(&mut self) -> FetchRequest {
        self.has_more_pages = true;
        self.issue_replace(true)
    }

    pub fn set_active_tab(&mut self, tab: ListingKind) -> Option<FetchRequest> {
        if tab == self.active_tab {
            return None;
        }
        tracing::info!("Switching to {} tab", tab.label());
        self.active_tab = tab;
        self.filter.kind = tab;
        self.has_more_pages = true;
        self.reconcile_favorite();
        Some(self.refresh())
    }

    pub fn set_filter_field(&mut self, change: FilterChange) -> Option<FetchRequest> {
        let filter = &mut self.filter;
        let changed = match change {
            FilterChange::Category(value) => replace_if_changed(&mut filter.category, value),
            FilterChange::Location(value) => replace_if_changed(&mut filter.location, value),
            FilterChange::Recency(value) => replace_if_changed(&mut filter.recency, value),
            FilterChange::Query(value) => replace_if_changed(&mut filter.q, value),
            FilterChange::WithPhoto(value) => replace_if_changed(&mut filter.with_photo, value),
            FilterChange::WithBody(value) => replace_if_changed(&mut filter.with_body, value),
        };
        if !changed {
            return None;
        }
        self.reconcile_favorite();
        Some(self.refresh())
    }

    /// Applies a whole edited filter at once. A different kind switches tab.
    pub fn replace_filter(&mut self, filter: ListingFilter) -> Option<FetchRequest> {
        if filter == self.filter {
            return None;
        }
        if filter.kind != self.active_tab {
            self.active_tab = filter.kind;
            self.has_more_pages = true;
        }
        self.filter = filter;
        self.reconcile_favorite();
        Some(self.refresh())
    }

    /// Reports the list's scroll offset; returns the next-page request when
    /// the offset crossed the threshold and more pages exist.
    pub fn on_scroll(&mut self, offset: f64) -> Option<FetchRequest> {
        if self.is_loading || !self.scroll.should_fire(offset) {
            return None;
        }
        self.load_more(offset)
    }

    pub fn load_more(&mut self, offset: f64) -> Option<FetchRequest> {
        if !self.has_more_pages {
            return None;
        }
        self.scroll.mark(offset);
        let page = self.current_page + 1;
        tracing::debug!("Fetching page {} of {}", page, self.active_tab.label());
        Some(FetchRequest {
            generation: self.generation,
            kind: self.active_tab,
            mode: FetchMode::Append,
            params: ListParams::from_filter(&self.filter, page),
        })
    }

    pub fn apply_page(&mut self, request: &FetchRequest, outcome: Result<ListingPage, ApiError>) {
        if request.generation != self.generation {
            tracing::debug!(
                "Dropping stale {:?} response (generation {}, current {})",
                request.mode,
                request.generation,
                self.generation
            );
            return;
        }

        self.is_loading = false;
        self.is_refreshing = false;

        match outcome {
            Ok(page) => {
                // an empty page never wipes what is already shown
                if !page.items.is_empty() {
                    let bucket = self.results_by_tab.entry(request.kind).or_default();
                    match request.mode {
                        FetchMode::Replace => *bucket = page.items,
                        FetchMode::Append => bucket.extend(page.items),
                    }
                }
                self.has_more_pages = page.has_more_pages;
                self.current_page = page.page.max(1);
            }
            Err(err) => self.report(&err),
        }
    }

    // --- Favorite filter ---

    pub fn toggle_favorite(&mut self) -> Option<FavoriteAction> {
        if self.favorite_in_flight {
            tracing::debug!("Favorite filter save already in flight");
            return None;
        }
        match self.favorite_filter_id {
            Some(id) => Some(FavoriteAction::Toggle(id)),
            None => {
                self.favorite_in_flight = true;
                tracing::info!("Saving current filter as favorite");
                Some(FavoriteAction::Create(self.filter.clone()))
            }
        }
    }

    /// Handles the outcome of a `Create`; on success returns the toggle that
    /// marks a saved filter as favorite. If another id became known while the
    /// save was in flight, that one is toggled; either way the created id is
    /// the one remembered afterwards.
    pub fn apply_favorite_created(&mut self, outcome: Result<i64, ApiError>) -> Option<FavoriteAction> {
        self.favorite_in_flight = false;
        match outcome {
            Ok(created_id) => {
                let toggle = match self.favorite_filter_id {
                    Some(known) if known != created_id && Some(known) != self.entry_favorite_id => {
                        tracing::warn!(
                            "Favorite filter {} became known while {} was being saved",
                            known,
                            created_id
                        );
                        known
                    }
                    _ => created_id,
                };
                self.favorite_filter_id = Some(created_id);
                Some(FavoriteAction::Toggle(toggle))
            }
            Err(err) => {
                self.report(&err);
                None
            }
        }
    }

    pub fn apply_favorite_toggled(&mut self, outcome: Result<bool, ApiError>) {
        match outcome {
            Ok(favorited) => self.is_favorited = favorited,
            Err(err) => self.report(&err),
        }
    }

    // --- Navigation ---

    /// Called whenever the screen gains focus. New navigation filters are
    /// adopted once; favorite state is reconciled against them; the active
    /// tab is reloaded.
    pub fn on_focus(&mut self, nav: &NavParams) -> FetchRequest {
        if let Some(filters) = &nav.filters {
            if self.applied_nav_filters.as_ref() != Some(filters) {
                self.applied_nav_filters = Some(filters.clone());
                if filters.kind != self.active_tab {
                    self.active_tab = filters.kind;
                    self.has_more_pages = true;
                }
                self.filter = filters.clone();
            }
        }

        self.nav_filters = nav.filters.clone();
        self.nav_favorite_id = nav.favorite_id;
        self.reconcile_favorite();

        self.refresh()
    }

    /// The filter counts as favorited only while it equals the saved filter
    /// the screen was entered with and that filter's id is known.
    fn reconcile_favorite(&mut self) {
        match self.nav_favorite_id {
            Some(id) if self.nav_filters.as_ref() == Some(&self.filter) => {
                self.is_favorited = true;
                self.favorite_filter_id = Some(id);
                self.entry_favorite_id = Some(id);
            }
            _ => {
                self.is_favorited = false;
                self.favorite_filter_id = None;
            }
        }
    }

    /// Drops navigation-attached filters so a later entry starts clean.
    pub fn on_exit(&mut self, nav: &mut NavParams) {
        nav.clear_filters();
        self.applied_nav_filters = None;
        self.nav_filters = None;
    }

    fn report(&mut self, err: &ApiError) {
        if err.is_auth() {
            // the transport already logged the session out
            tracing::info!("Request rejected: {}", err);
            return;
        }
        tracing::error!("Listing request failed: {}", err);
        self.notifier.error(&err.to_string());
    }
}
