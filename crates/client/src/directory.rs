//! User directory controller.
//!
//! Holds one query mode at a time (a filtered, paginated listing or a lookup
//! by identifier), turns state changes into API queries, and gates mutations
//! through the access guard before anything is sent.
//!
//! Every query takes a sequence number when it is issued. A response is only
//! applied if no newer query has been issued since, so out-of-order responses
//! never overwrite fresher results. The state lock is never held across an
//! `.await`.

use std::path::Path;
use std::sync::atomic::{AtomicU64, Ordering};

use parking_lot::Mutex;
use reqwest::Method;
use reqwest::multipart::{Form, Part};
use serde::Serialize;

use userdesk_auth::{Action, Affordances};
use userdesk_core::{
    FilterCriteria, Page, Pagination, SortOrder, UserDraft, UserId, UserRecord, ValueObject,
};

use crate::error::ClientError;
use crate::gateway::{Credentials, RequestGateway};

pub const USERS_PATH: &str = "/api/users";
pub const UPLOAD_PATH: &str = "/api/users/upload";

/// Which query drives the visible records.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum QueryMode {
    Listing,
    Lookup { id: String },
}

/// Read-only snapshot for rendering.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct DirectoryView {
    pub mode: QueryMode,
    pub filters: FilterCriteria,
    pub pagination: Pagination,
    pub sort: Option<SortOrder>,
    /// Zero-based page index.
    pub page: u64,
    pub page_count: u64,
    pub records: Vec<UserRecord>,
}

#[derive(Debug)]
struct DirectoryState {
    mode: QueryMode,
    filters: FilterCriteria,
    pagination: Pagination,
    sort: Option<SortOrder>,
    records: Vec<UserRecord>,
}

#[derive(Debug)]
pub struct UserDirectory {
    gateway: RequestGateway,
    state: Mutex<DirectoryState>,
    issued: AtomicU64,
}

impl UserDirectory {
    pub fn new(gateway: RequestGateway, page_size: u32) -> Result<Self, ClientError> {
        let pagination = Pagination::new(page_size)?;
        Ok(Self {
            gateway,
            state: Mutex::new(DirectoryState {
                mode: QueryMode::Listing,
                filters: FilterCriteria::default(),
                pagination,
                sort: None,
                records: Vec::new(),
            }),
            issued: AtomicU64::new(0),
        })
    }

    pub fn view(&self) -> DirectoryView {
        let state = self.state.lock();
        DirectoryView {
            mode: state.mode.clone(),
            filters: state.filters.clone(),
            pagination: state.pagination,
            sort: state.sort.clone(),
            page: state.pagination.page(),
            page_count: state.pagination.page_count(),
            records: state.records.clone(),
        }
    }

    /// Which mutation controls to offer for the current session.
    pub fn affordances(&self) -> Affordances {
        Affordances::for_session(&self.gateway.session().snapshot())
    }

    // ---- queries ----

    /// Run a listing query and make it the active one.
    ///
    /// On failure the previously shown page stays in place.
    pub async fn list(
        &self,
        filters: FilterCriteria,
        pagination: Pagination,
    ) -> Result<Vec<UserRecord>, ClientError> {
        let filters = filters.normalized();
        let sort = {
            let mut state = self.state.lock();
            state.mode = QueryMode::Listing;
            state.filters = filters.clone();
            state.pagination = pagination.with_total(state.pagination.total());
            state.sort.clone()
        };
        self.fetch_listing(&filters, pagination, sort.as_ref()).await
    }

    /// Fetch one record by identifier and make the lookup the active query.
    ///
    /// Not-found and unparsable identifiers clear the records and yield
    /// `Ok(None)`; no request is sent for an unparsable identifier. Any other
    /// failure also clears the records and is returned.
    pub async fn lookup(&self, id: &str) -> Result<Option<UserRecord>, ClientError> {
        let id = id.trim();
        {
            let mut state = self.state.lock();
            state.mode = QueryMode::Lookup { id: id.to_string() };
            state.filters = FilterCriteria::default();
        }
        let seq = self.begin();

        let Ok(user_id) = id.parse::<UserId>() else {
            tracing::debug!(id, "lookup identifier is not numeric");
            self.commit(seq, clear_records);
            return Ok(None);
        };

        match self.fetch_one(user_id).await {
            Ok(record) => {
                self.commit(seq, |state| {
                    state.records = vec![record.clone()];
                    state.pagination = state.pagination.with_total(1);
                });
                Ok(Some(record))
            }
            Err(err) if err.is_not_found() => {
                tracing::debug!(%user_id, "user not found");
                self.commit(seq, clear_records);
                Ok(None)
            }
            Err(err) => {
                tracing::warn!(%user_id, error = %err, "lookup failed");
                self.commit(seq, clear_records);
                Err(err)
            }
        }
    }

    /// Re-run the active query.
    pub async fn refresh(&self) -> Result<(), ClientError> {
        let (mode, filters, pagination, sort) = {
            let state = self.state.lock();
            (state.mode.clone(), state.filters.clone(), state.pagination, state.sort.clone())
        };
        match mode {
            QueryMode::Listing => self.fetch_listing(&filters, pagination, sort.as_ref()).await.map(|_| ()),
            QueryMode::Lookup { id } => self.lookup(&id).await.map(|_| ()),
        }
    }

    // ---- state transitions ----

    /// Non-blank text switches to a lookup; blank text returns to an
    /// unfiltered listing on the first page.
    pub async fn search_by_id(&self, text: &str) -> Result<(), ClientError> {
        let text = text.trim();
        if !text.is_empty() {
            let changed = {
                let state = self.state.lock();
                state.mode != QueryMode::Lookup { id: text.to_string() }
            };
            if changed {
                self.lookup(text).await?;
            }
            return Ok(());
        }

        let changed = {
            let mut state = self.state.lock();
            let changed = state.mode != QueryMode::Listing
                || !state.filters.is_empty()
                || state.pagination.offset() != 0;
            state.mode = QueryMode::Listing;
            state.filters = FilterCriteria::default();
            state.pagination = state.pagination.first_page();
            changed
        };
        self.requery_if(changed).await
    }

    /// Switch to a listing with `filters`, back on the first page.
    pub async fn apply_filters(&self, filters: FilterCriteria) -> Result<(), ClientError> {
        let filters = filters.normalized();
        let changed = {
            let mut state = self.state.lock();
            let mode_changed = state.mode != QueryMode::Listing;
            let offset_changed = state.pagination.offset() != 0;
            state.mode = QueryMode::Listing;
            state.pagination = state.pagination.first_page();
            state.filters.replace_with(filters) | mode_changed | offset_changed
        };
        self.requery_if(changed).await
    }

    pub async fn go_to_page(&self, page: u64) -> Result<(), ClientError> {
        let changed = {
            let mut state = self.state.lock();
            let next = state.pagination.with_page(page)?;
            let changed = !state.pagination.same_window(&next);
            state.pagination = next;
            changed
        };
        self.requery_if(changed).await
    }

    /// Change the page size; always returns to the first page.
    pub async fn set_page_size(&self, limit: u32) -> Result<(), ClientError> {
        let changed = {
            let mut state = self.state.lock();
            let next = state.pagination.with_limit(limit)?;
            let changed = !state.pagination.same_window(&next);
            state.pagination = next;
            changed
        };
        self.requery_if(changed).await
    }

    pub async fn set_sort(&self, sort: Option<SortOrder>) -> Result<(), ClientError> {
        let changed = {
            let mut state = self.state.lock();
            let changed = state.sort != sort;
            state.sort = sort;
            changed
        };
        self.requery_if(changed).await
    }

    /// Set the ordering used by the next query without issuing one.
    pub fn stage_sort(&self, sort: Option<SortOrder>) {
        self.state.lock().sort = sort;
    }

    // ---- mutations ----

    pub async fn create(&self, draft: &UserDraft) -> Result<(), ClientError> {
        self.authorize(Action::Create)?;
        let request = self.gateway.request(Method::POST, USERS_PATH)?.json(draft);
        self.mutate("create", request).await
    }

    /// Replace a record. The path identifier overrides any id in `draft`.
    pub async fn update(&self, id: UserId, draft: UserDraft) -> Result<(), ClientError> {
        self.authorize(Action::Edit)?;
        let request = self
            .gateway
            .request(Method::PUT, &format!("{USERS_PATH}/{id}"))?
            .json(&draft.for_update(id));
        self.mutate("update", request).await
    }

    pub async fn delete(&self, id: UserId) -> Result<(), ClientError> {
        self.authorize(Action::Delete)?;
        let request = self.gateway.request(Method::DELETE, &format!("{USERS_PATH}/{id}"))?;
        self.mutate("delete", request).await
    }

    /// Bulk import from CSV content, sent as the multipart part `file`.
    pub async fn upload_csv(&self, file_name: &str, content: Vec<u8>) -> Result<(), ClientError> {
        self.authorize(Action::Upload)?;
        if content.is_empty() {
            return Err(ClientError::Validation("please upload a non-empty CSV file".to_string()));
        }

        let part = Part::bytes(content)
            .file_name(file_name.to_string())
            .mime_str("text/csv")
            .map_err(|e| ClientError::Validation(e.to_string()))?;
        let request = self
            .gateway
            .request(Method::POST, UPLOAD_PATH)?
            .multipart(Form::new().part("file", part));
        self.mutate("upload", request).await
    }

    pub async fn upload_csv_path(&self, path: &Path) -> Result<(), ClientError> {
        self.authorize(Action::Upload)?;
        let content = tokio::fs::read(path)
            .await
            .map_err(|e| ClientError::Validation(format!("cannot read {}: {e}", path.display())))?;
        let file_name = path
            .file_name()
            .map(|name| name.to_string_lossy().into_owned())
            .unwrap_or_else(|| "upload.csv".to_string());
        self.upload_csv(&file_name, content).await
    }

    // ---- internals ----

    fn begin(&self) -> u64 {
        self.issued.fetch_add(1, Ordering::SeqCst) + 1
    }

    /// Apply `update` only if `seq` is still the latest issued query.
    fn commit(&self, seq: u64, update: impl FnOnce(&mut DirectoryState)) -> bool {
        let mut state = self.state.lock();
        if self.issued.load(Ordering::SeqCst) != seq {
            tracing::debug!(seq, "discarding stale response");
            return false;
        }
        update(&mut state);
        true
    }

    async fn fetch_listing(
        &self,
        filters: &FilterCriteria,
        pagination: Pagination,
        sort: Option<&SortOrder>,
    ) -> Result<Vec<UserRecord>, ClientError> {
        let seq = self.begin();

        let mut query = vec![
            ("offset", pagination.offset().to_string()),
            ("limit", pagination.limit().to_string()),
        ];
        query.extend(filters.query_pairs());
        if let Some(sort) = sort {
            query.extend(sort.query_pairs());
        }

        match self.gateway.get_json::<Page<UserRecord>, _>(USERS_PATH, &query).await {
            Ok(page) => {
                tracing::debug!(seq, count = page.content.len(), total = page.total_elements, "listing loaded");
                self.commit(seq, |state| {
                    state.records = page.content.clone();
                    state.pagination = state.pagination.with_total(page.total_elements);
                });
                Ok(page.content)
            }
            Err(err) => {
                let err = ClientError::from(err);
                tracing::warn!(seq, error = %err, "listing failed; keeping previous page");
                Err(err)
            }
        }
    }

    async fn fetch_one(&self, id: UserId) -> Result<UserRecord, ClientError> {
        let request = self.gateway.request(Method::GET, &format!("{USERS_PATH}/{id}"))?;
        let response = self.gateway.execute(request, Credentials::Session).await?;
        response.json::<UserRecord>().await.map_err(ClientError::Decode)
    }

    async fn requery_if(&self, changed: bool) -> Result<(), ClientError> {
        if changed { self.refresh().await } else { Ok(()) }
    }

    fn authorize(&self, action: Action) -> Result<(), ClientError> {
        let session = self.gateway.session().snapshot();
        action.authorize(&session).map_err(|denied| {
            tracing::warn!(?action, %denied, "action not permitted");
            ClientError::AuthorizationDenied(denied)
        })
    }

    /// Send a mutating call, then re-run the active query.
    ///
    /// A failed refresh after a successful mutation is logged, not returned.
    async fn mutate(&self, what: &'static str, request: reqwest::RequestBuilder) -> Result<(), ClientError> {
        if let Err(err) = self.gateway.execute(request, Credentials::Session).await {
            let err = ClientError::from(err);
            tracing::warn!(operation = what, error = %err, "mutation failed");
            return Err(err);
        }
        tracing::info!(operation = what, "mutation applied");

        if let Err(err) = self.refresh().await {
            tracing::warn!(operation = what, error = %err, "refresh after mutation failed");
        }
        Ok(())
    }
}

fn clear_records(state: &mut DirectoryState) {
    state.records.clear();
    state.pagination = state.pagination.with_total(0);
}
