//! # Student portal
//!
//! Everything a logged-in student sees about themself: dashboard,
//! attendance, assignments, results and timetable, plus submitting work.
//! Every call resolves the caller's own student profile first.

use std::collections::HashMap;
use std::sync::Arc;

use domains::models::{
    sort_newest_first, summarize_by_subject, tally_for, AssignmentStatus, AttendanceSummary,
    NewNotification, NotificationType, NotificationView, RelatedKind, RelatedTo, ResultRecord,
    Role, Student, StudentAssignmentView, Subject, SubjectAttendance, SubjectRef, Submission,
    User, weekly_schedule, WeeklySchedule,
};
use domains::ports::{
    AssignmentRepository, AttendanceRepository, AttendanceScope, Clock, Repositories,
    ResultRepository, StudentRepository, SubjectRepository, TeacherRepository, UserRepository,
};
use domains::{AppError, Result};
use serde::{Deserialize, Serialize};
use tracing::{info, warn};
use uuid::Uuid;
use validator::Validate;

use crate::access::{own_student, Actor};
use crate::notifications::NotificationService;
use crate::profiles::{attach_user, WithUser};
use crate::validation::validate_input;

const RECENT_NOTIFICATIONS: u32 = 5;

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct StudentDashboard {
    pub student: WithUser<Student>,
    pub attendance: AttendanceSummary,
    pub pending_assignments: usize,
    pub recent_notifications: Vec<NotificationView>,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AttendanceQuery {
    pub academic_year: Option<String>,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AssignmentQuery {
    pub status: Option<AssignmentStatus>,
}

#[derive(Debug, Clone, Deserialize, Validate)]
#[serde(rename_all = "camelCase")]
pub struct SubmitAssignmentRequest {
    #[validate(custom(function = "crate::validation::not_blank", message = "File URL is required"))]
    pub file_url: String,
}

pub struct StudentPortalService {
    students: Arc<dyn StudentRepository>,
    teachers: Arc<dyn TeacherRepository>,
    users: Arc<dyn UserRepository>,
    subjects: Arc<dyn SubjectRepository>,
    assignments: Arc<dyn AssignmentRepository>,
    attendance: Arc<dyn AttendanceRepository>,
    results: Arc<dyn ResultRepository>,
    notifications: Arc<NotificationService>,
    clock: Arc<dyn Clock>,
}

impl StudentPortalService {
    pub fn new(
        repos: &Repositories,
        notifications: Arc<NotificationService>,
        clock: Arc<dyn Clock>,
    ) -> Self {
        Self {
            students: repos.students.clone(),
            teachers: repos.teachers.clone(),
            users: repos.users.clone(),
            subjects: repos.subjects.clone(),
            assignments: repos.assignments.clone(),
            attendance: repos.attendance.clone(),
            results: repos.results.clone(),
            notifications,
            clock,
        }
    }

    pub async fn dashboard(&self, actor: &Actor) -> Result<StudentDashboard> {
        let student = self.me(actor).await?;
        let class = class_of(&student);
        let now = self.clock.now();

        let sheets = self
            .attendance
            .list_for_student(&AttendanceScope {
                student_id: student.id,
                class: class.clone(),
                academic_year: Some(student.academic_year.clone()),
            })
            .await?;
        let attendance = AttendanceSummary::from(tally_for(&sheets, student.id));

        let pending_assignments = self
            .assignments
            .list_by_class(&class, None)
            .await?
            .iter()
            .filter(|a| a.is_pending_for(student.id, now))
            .count();

        let recent_notifications = self
            .notifications
            .recent(actor.user_id, RECENT_NOTIFICATIONS)
            .await?;

        let user_id = student.user_id;
        Ok(StudentDashboard {
            student: attach_user(self.users.as_ref(), student, user_id).await?,
            attendance,
            pending_assignments,
            recent_notifications,
        })
    }

    /// Per-subject, per-term attendance; the year defaults to the student's own.
    pub async fn attendance(
        &self,
        actor: &Actor,
        query: AttendanceQuery,
    ) -> Result<Vec<SubjectAttendance>> {
        let student = self.me(actor).await?;
        let class = class_of(&student);
        let year = query
            .academic_year
            .filter(|y| !y.trim().is_empty())
            .unwrap_or_else(|| student.academic_year.clone());

        let sheets = self
            .attendance
            .list_for_student(&AttendanceScope {
                student_id: student.id,
                class: class.clone(),
                academic_year: Some(year.clone()),
            })
            .await?;
        let mut subject_ids: Vec<Uuid> = sheets.iter().map(|s| s.subject_id).collect();
        subject_ids.sort_unstable();
        subject_ids.dedup();
        let subjects: HashMap<Uuid, Subject> = self
            .subjects
            .find_by_ids(&subject_ids)
            .await?
            .into_iter()
            .map(|s| (s.id, s))
            .collect();

        Ok(summarize_by_subject(&sheets, student.id, &class, &year, &subjects))
    }

    pub async fn assignments(
        &self,
        actor: &Actor,
        query: AssignmentQuery,
    ) -> Result<Vec<StudentAssignmentView>> {
        let student = self.me(actor).await?;
        let assignments = self
            .assignments
            .list_by_class(&class_of(&student), query.status)
            .await?;
        Ok(assignments.iter().map(|a| a.view_for(student.id)).collect())
    }

    pub async fn results(&self, actor: &Actor) -> Result<Vec<ResultRecord>> {
        let student = self.me(actor).await?;
        let mut results = self.results.list_for_student(student.id).await?;
        sort_newest_first(&mut results);

        let mut subject_ids: Vec<Uuid> = results
            .iter()
            .flat_map(|r| r.exam_results.iter().map(|e| e.subject_id))
            .collect();
        subject_ids.sort_unstable();
        subject_ids.dedup();
        let subjects: HashMap<Uuid, SubjectRef> = self
            .subjects
            .find_by_ids(&subject_ids)
            .await?
            .iter()
            .map(|s| (s.id, SubjectRef::from(s)))
            .collect();
        Ok(results
            .into_iter()
            .map(|r| r.with_subjects(&subjects))
            .collect())
    }

    pub async fn schedule(&self, actor: &Actor) -> Result<WeeklySchedule> {
        let student = self.me(actor).await?;
        let subjects = self
            .subjects
            .list_by_grade(&student.grade, &student.academic_year)
            .await?;

        let mut teacher_ids: Vec<Uuid> = subjects.iter().map(|s| s.teacher_id).collect();
        teacher_ids.sort_unstable();
        teacher_ids.dedup();
        let teachers = self.teachers.find_by_ids(&teacher_ids).await?;
        let user_ids: Vec<Uuid> = teachers.iter().map(|t| t.user_id).collect();
        let names: HashMap<Uuid, String> = self
            .users
            .find_by_ids(&user_ids)
            .await?
            .into_iter()
            .map(|u: User| (u.id, u.full_name()))
            .collect();
        let teacher_names: HashMap<Uuid, String> = teachers
            .into_iter()
            .filter_map(|t| names.get(&t.user_id).map(|n| (t.id, n.clone())))
            .collect();

        Ok(weekly_schedule(&subjects, |id| teacher_names.get(&id).cloned()))
    }

    /// Replaces any earlier submission and notifies the assignment's teacher.
    pub async fn submit(
        &self,
        actor: &Actor,
        assignment_id: Uuid,
        req: SubmitAssignmentRequest,
    ) -> Result<Submission> {
        validate_input(&req)?;
        let student = self.me(actor).await?;
        let mut assignment = self
            .assignments
            .find_by_id(assignment_id)
            .await?
            .ok_or_else(|| AppError::not_found("Assignment", assignment_id))?;
        if assignment.class != class_of(&student) {
            return Err(AppError::Forbidden("Assignment is not for your class".into()));
        }

        let now = self.clock.now();
        let submission = assignment
            .submit(student.id, req.file_url.trim().to_string(), now)
            .clone();
        self.assignments.update(&assignment).await?;
        info!(
            assignment_id = %assignment.id,
            student_id = %student.id,
            status = ?submission.status,
            "assignment submitted"
        );

        match self.teachers.find_by_id(assignment.teacher_id).await? {
            Some(teacher) => {
                self.notifications
                    .send(NewNotification {
                        title: "New Assignment Submission".into(),
                        message: format!(
                            "Student {} submitted \"{}\"",
                            student.student_code, assignment.title
                        ),
                        kind: NotificationType::Assignment,
                        recipients: vec![teacher.user_id],
                        related_to: Some(RelatedTo {
                            kind: RelatedKind::Assignment,
                            id: Some(assignment.id),
                        }),
                        created_by: Some(actor.user_id),
                        ..Default::default()
                    })
                    .await?;
            }
            None => warn!(teacher_id = %assignment.teacher_id, "assignment teacher missing"),
        }
        Ok(submission)
    }

    async fn me(&self, actor: &Actor) -> Result<Student> {
        actor.require_role(Role::Student)?;
        own_student(self.students.as_ref(), actor).await
    }
}

fn class_of(student: &Student) -> String {
    student.class.clone().unwrap_or_default()
}
