pub mod dto;

use std::sync::Mutex;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::time::Duration;

use async_trait::async_trait;
use reqwest::{Client, Response, StatusCode};

use crate::error::AppError;
use crate::models::{Announcement, Lesson};

/// Typed operations against the remote academic-scheduling backend.
#[async_trait]
pub trait ScheduleApi: Send + Sync {
    async fn login(&self, username: &str, password: &str) -> Result<String, AppError>;
    async fn fetch_profile(&self, token: &str) -> Result<dto::ProfileResponse, AppError>;
    async fn change_password(&self, token: &str, old: &str, new: &str) -> Result<(), AppError>;
    async fn fetch_lessons(
        &self,
        token: &str,
        query: &dto::LessonQuery,
    ) -> Result<Vec<Lesson>, AppError>;
    async fn create_lesson(
        &self,
        token: &str,
        req: &dto::NewLessonRequest,
    ) -> Result<Lesson, AppError>;
    async fn update_lesson(
        &self,
        token: &str,
        id: i64,
        req: &dto::UpdateLessonRequest,
    ) -> Result<Lesson, AppError>;
    async fn delete_lesson(&self, token: &str, id: i64) -> Result<(), AppError>;
    async fn fetch_announcements(
        &self,
        token: &str,
        page_size: u32,
    ) -> Result<Vec<Announcement>, AppError>;
    async fn fetch_announcement(&self, token: &str, id: i64) -> Result<Announcement, AppError>;
}

pub struct HttpScheduleApi {
    client: Client,
    base: String,
}

impl HttpScheduleApi {
    pub fn new(base: impl Into<String>) -> Result<Self, AppError> {
        let client = Client::builder()
            .connect_timeout(Duration::from_secs(30))
            .timeout(Duration::from_secs(30))
            .build()
            .map_err(|e| AppError::BadRequest(format!("Failed to build http client: {}", e)))?;
        Ok(Self {
            client,
            base: base.into().trim_end_matches('/').to_string(),
        })
    }

    fn url(&self, path: &str) -> String {
        format!("{}{}", self.base, path)
    }

    fn auth(token: &str) -> String {
        format!("Token {}", token)
    }

    /// A 401 means the token is no longer valid; the contract has no refresh
    /// endpoint, so callers clear the session and force a re-login.
    async fn check(response: Response) -> Result<Response, AppError> {
        let status = response.status();
        if status == StatusCode::UNAUTHORIZED {
            return Err(AppError::SessionExpired);
        }
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(AppError::Api {
                status: status.as_u16(),
                message: body,
            });
        }
        Ok(response)
    }
}

#[async_trait]
impl ScheduleApi for HttpScheduleApi {
    async fn login(&self, username: &str, password: &str) -> Result<String, AppError> {
        let response = self
            .client
            .post(self.url("/token/"))
            .json(&dto::TokenRequest { username, password })
            .send()
            .await?;
        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(AppError::Api {
                status: status.as_u16(),
                message: body,
            });
        }
        let parsed: dto::TokenResponse = response.json().await?;
        Ok(parsed.token)
    }

    async fn fetch_profile(&self, token: &str) -> Result<dto::ProfileResponse, AppError> {
        let response = self
            .client
            .get(self.url("/profiles/me/"))
            .header("Authorization", Self::auth(token))
            .send()
            .await?;
        Ok(Self::check(response).await?.json().await?)
    }

    async fn change_password(&self, token: &str, old: &str, new: &str) -> Result<(), AppError> {
        let response = self
            .client
            .post(self.url("/profiles/change_password/"))
            .header("Authorization", Self::auth(token))
            .json(&dto::ChangePasswordRequest {
                old_password: old,
                new_password: new,
            })
            .send()
            .await?;
        Self::check(response).await?;
        Ok(())
    }

    async fn fetch_lessons(
        &self,
        token: &str,
        query: &dto::LessonQuery,
    ) -> Result<Vec<Lesson>, AppError> {
        let response = self
            .client
            .get(self.url("/lessons/"))
            .header("Authorization", Self::auth(token))
            .query(&query.params())
            .send()
            .await?;
        let parsed: dto::Paginated<Lesson> = Self::check(response).await?.json().await?;
        Ok(parsed.results)
    }

    async fn create_lesson(
        &self,
        token: &str,
        req: &dto::NewLessonRequest,
    ) -> Result<Lesson, AppError> {
        let response = self
            .client
            .post(self.url("/lessons/"))
            .header("Authorization", Self::auth(token))
            .json(req)
            .send()
            .await?;
        Ok(Self::check(response).await?.json().await?)
    }

    async fn update_lesson(
        &self,
        token: &str,
        id: i64,
        req: &dto::UpdateLessonRequest,
    ) -> Result<Lesson, AppError> {
        let response = self
            .client
            .patch(self.url(&format!("/lessons/{}/", id)))
            .header("Authorization", Self::auth(token))
            .json(req)
            .send()
            .await?;
        Ok(Self::check(response).await?.json().await?)
    }

    async fn delete_lesson(&self, token: &str, id: i64) -> Result<(), AppError> {
        let response = self
            .client
            .delete(self.url(&format!("/lessons/{}/", id)))
            .header("Authorization", Self::auth(token))
            .send()
            .await?;
        Self::check(response).await?;
        Ok(())
    }

    async fn fetch_announcements(
        &self,
        token: &str,
        page_size: u32,
    ) -> Result<Vec<Announcement>, AppError> {
        let response = self
            .client
            .get(self.url("/notifications/"))
            .header("Authorization", Self::auth(token))
            .query(&[("page_size", page_size.to_string())])
            .send()
            .await?;
        let parsed: dto::Paginated<Announcement> = Self::check(response).await?.json().await?;
        Ok(parsed.results)
    }

    async fn fetch_announcement(&self, token: &str, id: i64) -> Result<Announcement, AppError> {
        let response = self
            .client
            .get(self.url(&format!("/notifications/{}/", id)))
            .header("Authorization", Self::auth(token))
            .send()
            .await?;
        Ok(Self::check(response).await?.json().await?)
    }
}

/// Canned-response client for tests and offline runs.
pub struct StubScheduleApi {
    pub token: String,
    profile: Mutex<dto::ProfileResponse>,
    lessons: Mutex<Vec<Lesson>>,
    announcements: Mutex<Vec<Announcement>>,
    fail_login: AtomicBool,
    fail_lessons: AtomicBool,
    fail_announcements: AtomicBool,
    expire_token: AtomicBool,
    announcement_fetches: AtomicUsize,
}

impl Default for StubScheduleApi {
    fn default() -> Self {
        Self {
            token: "stub-token".to_string(),
            profile: Mutex::new(dto::ProfileResponse {
                id: 1,
                username: "jdoe".to_string(),
                full_name: "Jane Doe".to_string(),
                email: "jdoe@example.edu".to_string(),
                user_type: "student".to_string(),
                group_name: Some("G1".to_string()),
            }),
            lessons: Mutex::new(Vec::new()),
            announcements: Mutex::new(Vec::new()),
            fail_login: AtomicBool::new(false),
            fail_lessons: AtomicBool::new(false),
            fail_announcements: AtomicBool::new(false),
            expire_token: AtomicBool::new(false),
            announcement_fetches: AtomicUsize::new(0),
        }
    }
}

impl StubScheduleApi {
    pub fn with_announcements(announcements: Vec<Announcement>) -> Self {
        let stub = Self::default();
        *stub.announcements.lock().unwrap() = announcements;
        stub
    }

    pub fn set_announcements(&self, announcements: Vec<Announcement>) {
        *self.announcements.lock().unwrap() = announcements;
    }

    pub fn set_lessons(&self, lessons: Vec<Lesson>) {
        *self.lessons.lock().unwrap() = lessons;
    }

    pub fn set_fail_login(&self, fail: bool) {
        self.fail_login.store(fail, Ordering::SeqCst);
    }

    pub fn set_fail_lessons(&self, fail: bool) {
        self.fail_lessons.store(fail, Ordering::SeqCst);
    }

    pub fn set_fail_announcements(&self, fail: bool) {
        self.fail_announcements.store(fail, Ordering::SeqCst);
    }

    /// Every authenticated call answers 401 until switched off again.
    pub fn set_expire_token(&self, expired: bool) {
        self.expire_token.store(expired, Ordering::SeqCst);
    }

    pub fn announcement_fetches(&self) -> usize {
        self.announcement_fetches.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl ScheduleApi for StubScheduleApi {
    async fn login(&self, _username: &str, password: &str) -> Result<String, AppError> {
        if self.fail_login.load(Ordering::SeqCst) || password.is_empty() {
            return Err(AppError::Api {
                status: 400,
                message: "invalid credentials".to_string(),
            });
        }
        Ok(self.token.clone())
    }

    async fn fetch_profile(&self, _token: &str) -> Result<dto::ProfileResponse, AppError> {
        Ok(self.profile.lock().unwrap().clone())
    }

    async fn change_password(&self, _token: &str, _old: &str, _new: &str) -> Result<(), AppError> {
        Ok(())
    }

    async fn fetch_lessons(
        &self,
        _token: &str,
        _query: &dto::LessonQuery,
    ) -> Result<Vec<Lesson>, AppError> {
        if self.expire_token.load(Ordering::SeqCst) {
            return Err(AppError::SessionExpired);
        }
        if self.fail_lessons.load(Ordering::SeqCst) {
            return Err(AppError::Api {
                status: 500,
                message: "lesson service unavailable".to_string(),
            });
        }
        Ok(self.lessons.lock().unwrap().clone())
    }

    async fn create_lesson(
        &self,
        _token: &str,
        _req: &dto::NewLessonRequest,
    ) -> Result<Lesson, AppError> {
        Err(AppError::Api {
            status: 403,
            message: "students cannot create lessons".to_string(),
        })
    }

    async fn update_lesson(
        &self,
        _token: &str,
        _id: i64,
        _req: &dto::UpdateLessonRequest,
    ) -> Result<Lesson, AppError> {
        Err(AppError::NotFound)
    }

    async fn delete_lesson(&self, _token: &str, _id: i64) -> Result<(), AppError> {
        Err(AppError::NotFound)
    }

    async fn fetch_announcements(
        &self,
        _token: &str,
        _page_size: u32,
    ) -> Result<Vec<Announcement>, AppError> {
        self.announcement_fetches.fetch_add(1, Ordering::SeqCst);
        if self.expire_token.load(Ordering::SeqCst) {
            return Err(AppError::SessionExpired);
        }
        if self.fail_announcements.load(Ordering::SeqCst) {
            return Err(AppError::Api {
                status: 500,
                message: "announcement service unavailable".to_string(),
            });
        }
        Ok(self.announcements.lock().unwrap().clone())
    }

    async fn fetch_announcement(&self, _token: &str, id: i64) -> Result<Announcement, AppError> {
        self.announcements
            .lock()
            .unwrap()
            .iter()
            .find(|a| a.id == id)
            .cloned()
            .ok_or(AppError::NotFound)
    }
}
