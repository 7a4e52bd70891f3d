//! # services
//!
//! EduTrack use cases. Each service holds the ports it needs as
//! `Arc<dyn Trait>` and knows nothing about HTTP or storage engines.

pub mod access;
pub mod assignments;
pub mod attendance;
pub mod auth;
pub mod captcha;
pub mod notifications;
pub mod parents;
pub mod portal;
pub mod profiles;
pub mod results;
pub mod students;
pub mod subjects;
pub mod teachers;
pub mod tokens;
pub mod users;
pub mod validation;

#[cfg(test)]
mod testing;

use std::sync::Arc;

use domains::ports::{
    CaptchaRenderer, CaptchaStore, CaptchaVerifier, Clock, PasswordHasher, Repositories,
    TokenIssuer,
};

pub use access::Actor;
pub use auth::AuthPolicy;

use assignments::AssignmentService;
use attendance::AttendanceService;
use auth::AuthService;
use captcha::CaptchaService;
use notifications::NotificationService;
use parents::ParentService;
use portal::StudentPortalService;
use results::ResultService;
use students::StudentService;
use subjects::SubjectService;
use teachers::TeacherService;
use users::UserService;

/// Non-repository adapters the services depend on.
#[derive(Clone)]
pub struct Infrastructure {
    pub hasher: Arc<dyn PasswordHasher>,
    pub tokens: Arc<dyn TokenIssuer>,
    pub captcha_store: Arc<dyn CaptchaStore>,
    pub captcha_renderer: Arc<dyn CaptchaRenderer>,
    pub captcha_verifier: Arc<dyn CaptchaVerifier>,
    pub clock: Arc<dyn Clock>,
}

/// Every service, wired once at startup and shared by the handlers.
#[derive(Clone)]
pub struct Services {
    pub auth: Arc<AuthService>,
    pub captcha: Arc<CaptchaService>,
    pub users: Arc<UserService>,
    pub students: Arc<StudentService>,
    pub teachers: Arc<TeacherService>,
    pub parents: Arc<ParentService>,
    pub subjects: Arc<SubjectService>,
    pub attendance: Arc<AttendanceService>,
    pub assignments: Arc<AssignmentService>,
    pub results: Arc<ResultService>,
    pub notifications: Arc<NotificationService>,
    pub portal: Arc<StudentPortalService>,
}

impl Services {
    pub fn new(repos: &Repositories, infra: Infrastructure, policy: AuthPolicy) -> Self {
        let clock = infra.clock.clone();
        let captcha = Arc::new(CaptchaService::new(
            infra.captcha_store,
            infra.captcha_renderer,
            infra.captcha_verifier,
            clock.clone(),
        ));
        let notifications = Arc::new(NotificationService::new(
            repos.notifications.clone(),
            clock.clone(),
        ));
        Self {
            auth: Arc::new(AuthService::new(
                repos,
                infra.hasher.clone(),
                infra.tokens,
                captcha.clone(),
                clock.clone(),
                policy,
            )),
            users: Arc::new(UserService::new(
                repos.users.clone(),
                infra.hasher,
                clock.clone(),
            )),
            students: Arc::new(StudentService::new(repos, clock.clone())),
            teachers: Arc::new(TeacherService::new(repos, clock.clone())),
            parents: Arc::new(ParentService::new(repos, clock.clone())),
            subjects: Arc::new(SubjectService::new(repos, clock.clone())),
            attendance: Arc::new(AttendanceService::new(repos, clock.clone())),
            assignments: Arc::new(AssignmentService::new(repos, clock.clone())),
            results: Arc::new(ResultService::new(repos, clock.clone())),
            portal: Arc::new(StudentPortalService::new(
                repos,
                notifications.clone(),
                clock,
            )),
            captcha,
            notifications,
        }
    }
}
