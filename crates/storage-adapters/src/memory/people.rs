//! Accounts and the three role profiles.

use async_trait::async_trait;
use dashmap::mapref::entry::Entry;
use domains::models::{
    Page, PageRequest, Parent, ParentFilter, Profile, Student, StudentFilter, Teacher,
    TeacherFilter, TokenKind, User, UserFilter,
};
use domains::ports::{ParentRepository, StudentRepository, TeacherRepository, UserRepository};
use domains::{AppError, Result};
use uuid::Uuid;

use super::{collect, page_of, MemoryStore};

fn missing(entity: &str, id: Uuid) -> AppError {
    AppError::not_found(entity, id)
}

#[async_trait]
impl UserRepository for MemoryStore {
    async fn create_account(&self, user: &User, profile: &Profile) -> Result<()> {
        match self.emails.entry(user.email.clone()) {
            Entry::Occupied(_) => {
                return Err(AppError::Conflict("User with this email already exists".into()))
            }
            Entry::Vacant(slot) => {
                slot.insert(user.id);
            }
        }
        self.users.insert(user.id, user.clone());
        match profile {
            Profile::Student(s) => {
                self.students.insert(s.id, s.clone());
            }
            Profile::Teacher(t) => {
                self.teachers.insert(t.id, t.clone());
            }
            Profile::Parent(p) => {
                self.parents.insert(p.id, p.clone());
            }
        }
        Ok(())
    }

    async fn update(&self, user: &User) -> Result<()> {
        let mut slot = self
            .users
            .get_mut(&user.id)
            .ok_or_else(|| missing("User", user.id))?;
        *slot = user.clone();
        Ok(())
    }

    async fn find_by_id(&self, id: Uuid) -> Result<Option<User>> {
        Ok(self.users.get(&id).map(|u| u.clone()))
    }

    async fn find_by_ids(&self, ids: &[Uuid]) -> Result<Vec<User>> {
        Ok(ids
            .iter()
            .filter_map(|id| self.users.get(id).map(|u| u.clone()))
            .collect())
    }

    async fn find_by_email(&self, email: &str) -> Result<Option<User>> {
        let Some(id) = self.emails.get(email).map(|id| *id) else {
            return Ok(None);
        };
        Ok(self.users.get(&id).map(|u| u.clone()))
    }

    async fn find_by_token(&self, kind: TokenKind, hash: &str) -> Result<Option<User>> {
        Ok(self
            .users
            .iter()
            .find(|e| e.value().token(kind).is_some_and(|t| t.hash == hash))
            .map(|e| e.value().clone()))
    }

    async fn list(&self, filter: &UserFilter, page: PageRequest) -> Result<Page<User>> {
        let users = collect(&self.users, |u| filter.matches(u));
        Ok(page_of(users, |a, b| b.created_at.cmp(&a.created_at), page))
    }
}

#[async_trait]
impl StudentRepository for MemoryStore {
    async fn update(&self, student: &Student) -> Result<()> {
        let mut slot = self
            .students
            .get_mut(&student.id)
            .ok_or_else(|| missing("Student", student.id))?;
        *slot = student.clone();
        Ok(())
    }

    async fn find_by_id(&self, id: Uuid) -> Result<Option<Student>> {
        Ok(self.students.get(&id).map(|s| s.clone()))
    }

    async fn find_by_user(&self, user_id: Uuid) -> Result<Option<Student>> {
        Ok(collect(&self.students, |s| s.user_id == user_id).pop())
    }

    async fn find_by_code(&self, code: &str) -> Result<Option<Student>> {
        Ok(collect(&self.students, |s| s.student_code == code).pop())
    }

    async fn list(&self, filter: &StudentFilter, page: PageRequest) -> Result<Page<Student>> {
        let students = collect(&self.students, |s| filter.matches(s));
        Ok(page_of(students, |a, b| a.student_code.cmp(&b.student_code), page))
    }
}

#[async_trait]
impl TeacherRepository for MemoryStore {
    async fn update(&self, teacher: &Teacher) -> Result<()> {
        let mut slot = self
            .teachers
            .get_mut(&teacher.id)
            .ok_or_else(|| missing("Teacher", teacher.id))?;
        *slot = teacher.clone();
        Ok(())
    }

    async fn find_by_id(&self, id: Uuid) -> Result<Option<Teacher>> {
        Ok(self.teachers.get(&id).map(|t| t.clone()))
    }

    async fn find_by_ids(&self, ids: &[Uuid]) -> Result<Vec<Teacher>> {
        Ok(ids
            .iter()
            .filter_map(|id| self.teachers.get(id).map(|t| t.clone()))
            .collect())
    }

    async fn find_by_user(&self, user_id: Uuid) -> Result<Option<Teacher>> {
        Ok(collect(&self.teachers, |t| t.user_id == user_id).pop())
    }

    async fn list(&self, filter: &TeacherFilter, page: PageRequest) -> Result<Page<Teacher>> {
        let teachers = collect(&self.teachers, |t| filter.matches(t));
        Ok(page_of(teachers, |a, b| a.teacher_code.cmp(&b.teacher_code), page))
    }
}

#[async_trait]
impl ParentRepository for MemoryStore {
    async fn update(&self, parent: &Parent) -> Result<()> {
        let mut slot = self
            .parents
            .get_mut(&parent.id)
            .ok_or_else(|| missing("Parent", parent.id))?;
        *slot = parent.clone();
        Ok(())
    }

    async fn find_by_id(&self, id: Uuid) -> Result<Option<Parent>> {
        Ok(self.parents.get(&id).map(|p| p.clone()))
    }

    async fn find_by_user(&self, user_id: Uuid) -> Result<Option<Parent>> {
        Ok(collect(&self.parents, |p| p.user_id == user_id).pop())
    }

    async fn list(&self, filter: &ParentFilter, page: PageRequest) -> Result<Page<Parent>> {
        let parents = collect(&self.parents, |p| filter.matches(p));
        Ok(page_of(parents, |a, b| a.parent_code.cmp(&b.parent_code), page))
    }

    async fn find_by_student(&self, student_id: Uuid) -> Result<Vec<Parent>> {
        let active = ParentFilter::default();
        let mut parents =
            collect(&self.parents, |p| active.matches(p) && p.has_student(student_id));
        parents.sort_by(|a, b| a.parent_code.cmp(&b.parent_code));
        Ok(parents)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{NaiveDate, Utc};
    use domains::models::{Address, NewStudent, NewUser, Role};

    fn user(email: &str, role: Role) -> User {
        User::new(
            NewUser {
                first_name: "Grace".into(),
                last_name: "Hopper".into(),
                email: email.into(),
                password_hash: "hash".into(),
                phone: "+15550002".into(),
                date_of_birth: NaiveDate::from_ymd_opt(2009, 12, 9).unwrap(),
                role,
                address: Address {
                    street: "1 Navy Yard".into(),
                    city: "Arlington".into(),
                    state: "VA".into(),
                    zip_code: "22202".into(),
                },
            },
            Utc::now(),
        )
    }

    fn student_for(user: &User, code: &str) -> Profile {
        Profile::Student(Student::new(
            NewStudent {
                user_id: user.id,
                student_code: code.into(),
                grade: "8".into(),
                class: Some("8A".into()),
                section: None,
                academic_year: "2024".into(),
            },
            Utc::now(),
        ))
    }

    #[tokio::test]
    async fn duplicate_email_conflicts_and_stores_nothing() {
        let store = MemoryStore::new();
        let first = user("grace@example.com", Role::Student);
        store
            .create_account(&first, &student_for(&first, "STU20240001"))
            .await
            .unwrap();

        let second = user("grace@example.com", Role::Student);
        let err = store
            .create_account(&second, &student_for(&second, "STU20240002"))
            .await
            .unwrap_err();
        assert!(matches!(err, AppError::Conflict(_)));
        assert!(UserRepository::find_by_id(&store, second.id).await.unwrap().is_none());
        assert!(store.find_by_code("STU20240002").await.unwrap().is_none());
    }

    #[tokio::test]
    async fn profile_is_reachable_by_user_and_code() {
        let store = MemoryStore::new();
        let u = user("kid@example.com", Role::Student);
        store
            .create_account(&u, &student_for(&u, "STU20240007"))
            .await
            .unwrap();
        let by_user = StudentRepository::find_by_user(&store, u.id).await.unwrap().unwrap();
        let by_code = store.find_by_code("STU20240007").await.unwrap().unwrap();
        assert_eq!(by_user.id, by_code.id);
    }

    #[tokio::test]
    async fn user_list_skips_inactive_accounts() {
        let store = MemoryStore::new();
        let active = user("a@example.com", Role::Student);
        let mut gone = user("b@example.com", Role::Student);
        store.create_account(&active, &student_for(&active, "STU20240001")).await.unwrap();
        store.create_account(&gone, &student_for(&gone, "STU20240002")).await.unwrap();
        gone.is_active = false;
        UserRepository::update(&store, &gone).await.unwrap();

        let page = UserRepository::list(&store, &UserFilter::default(), PageRequest::default())
            .await
            .unwrap();
        assert_eq!(page.total, 1);
        assert_eq!(page.items[0].id, active.id);
    }
}
