//! Shared value types: roles, terms, pagination, human-readable profile codes.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// The three account kinds. Every user has exactly one.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    Student,
    Teacher,
    Parent,
}

impl Role {
    pub fn as_str(&self) -> &'static str {
        match self {
            Role::Student => "student",
            Role::Teacher => "teacher",
            Role::Parent => "parent",
        }
    }
}

impl fmt::Display for Role {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Role {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "student" => Ok(Role::Student),
            "teacher" => Ok(Role::Teacher),
            "parent" => Ok(Role::Parent),
            other => Err(format!("unknown role '{other}'")),
        }
    }
}

/// School term within an academic year, serialized as "1" | "2" | "3".
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum Term {
    #[serde(rename = "1")]
    First,
    #[serde(rename = "2")]
    Second,
    #[serde(rename = "3")]
    Third,
}

impl Term {
    pub fn as_str(&self) -> &'static str {
        match self {
            Term::First => "1",
            Term::Second => "2",
            Term::Third => "3",
        }
    }
}

impl FromStr for Term {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "1" => Ok(Term::First),
            "2" => Ok(Term::Second),
            "3" => Ok(Term::Third),
            other => Err(format!("unknown term '{other}'")),
        }
    }
}

/// Family relationship used on both sides of a student/parent link.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Relationship {
    Mother,
    Father,
    Guardian,
    Grandparent,
    Other,
}

/// Named contact stored on student and teacher profiles.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EmergencyContact {
    pub name: Option<String>,
    pub relationship: Option<String>,
    pub phone: Option<String>,
    pub email: Option<String>,
}

/// 1-based page request. `limit` is clamped to `1..=MAX_PAGE_SIZE`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PageRequest {
    pub page: u32,
    pub limit: u32,
}

pub const DEFAULT_PAGE_SIZE: u32 = 10;
pub const MAX_PAGE_SIZE: u32 = 100;

impl PageRequest {
    pub fn new(page: Option<u32>, limit: Option<u32>) -> Self {
        Self {
            page: page.unwrap_or(1).max(1),
            limit: limit.unwrap_or(DEFAULT_PAGE_SIZE).clamp(1, MAX_PAGE_SIZE),
        }
    }

    /// Rows to skip. Saturates instead of overflowing for absurd page numbers.
    pub fn offset(&self) -> u64 {
        u64::from(self.page - 1).saturating_mul(u64::from(self.limit))
    }
}

impl Default for PageRequest {
    fn default() -> Self {
        Self::new(None, None)
    }
}

/// One page of a listing plus the numbers a client needs to paginate.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Page<T> {
    pub items: Vec<T>,
    pub total: u64,
    pub current_page: u32,
    pub total_pages: u32,
}

impl<T> Page<T> {
    pub fn new(items: Vec<T>, total: u64, request: PageRequest) -> Self {
        let total_pages = total.div_ceil(request.limit as u64) as u32;
        Self {
            items,
            total,
            current_page: request.page,
            total_pages,
        }
    }

    /// Slices an already-filtered, already-sorted collection.
    pub fn from_sorted(all: Vec<T>, request: PageRequest) -> Self {
        let total = all.len() as u64;
        let items = all
            .into_iter()
            .skip(usize::try_from(request.offset()).unwrap_or(usize::MAX))
            .take(request.limit as usize)
            .collect();
        Self::new(items, total, request)
    }

    pub fn map<U>(self, f: impl FnMut(T) -> U) -> Page<U> {
        Page {
            items: self.items.into_iter().map(f).collect(),
            total: self.total,
            current_page: self.current_page,
            total_pages: self.total_pages,
        }
    }
}

/// Which profile table a human-readable code belongs to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ProfileKind {
    Student,
    Teacher,
    Parent,
}

impl ProfileKind {
    pub fn prefix(&self) -> &'static str {
        match self {
            ProfileKind::Student => "STU",
            ProfileKind::Teacher => "TCH",
            ProfileKind::Parent => "PAR",
        }
    }

    /// `STU20240007`: prefix, four-digit year, four-digit running number.
    /// Numbers past 9999 simply widen.
    pub fn code(&self, year: i32, sequence: u64) -> String {
        format!("{}{}{:04}", self.prefix(), year, sequence)
    }

    /// Counter key handed to the `IdSequence` port.
    pub fn sequence_key(&self, year: i32) -> String {
        format!("{}{}", self.prefix(), year)
    }
}

impl From<Role> for ProfileKind {
    fn from(role: Role) -> Self {
        match role {
            Role::Student => ProfileKind::Student,
            Role::Teacher => ProfileKind::Teacher,
            Role::Parent => ProfileKind::Parent,
        }
    }
}
