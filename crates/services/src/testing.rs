//! Mock wiring shared by the service unit tests.

use std::sync::Arc;

use domains::ports::{
    MockAssignmentRepository, MockAttendanceRepository, MockIdSequence,
    MockNotificationRepository, MockParentRepository, MockResultRepository,
    MockStudentRepository, MockSubjectRepository, MockTeacherRepository, MockUserRepository,
    Repositories,
};

/// One mock per repository; set expectations, then hand to [`mock_repositories`].
#[derive(Default)]
pub struct MockSet {
    pub users: MockUserRepository,
    pub students: MockStudentRepository,
    pub teachers: MockTeacherRepository,
    pub parents: MockParentRepository,
    pub subjects: MockSubjectRepository,
    pub assignments: MockAssignmentRepository,
    pub attendance: MockAttendanceRepository,
    pub results: MockResultRepository,
    pub notifications: MockNotificationRepository,
    pub sequences: MockIdSequence,
}

pub fn mock_repositories(m: MockSet) -> Repositories {
    Repositories {
        users: Arc::new(m.users),
        students: Arc::new(m.students),
        teachers: Arc::new(m.teachers),
        parents: Arc::new(m.parents),
        subjects: Arc::new(m.subjects),
        assignments: Arc::new(m.assignments),
        attendance: Arc::new(m.attendance),
        results: Arc::new(m.results),
        notifications: Arc::new(m.notifications),
        sequences: Arc::new(m.sequences),
    }
}
