//! crates/companion_core/src/client_state.rs
//!
//! The browser-side application state container. One named slot per entity
//! collection, each paired with a fetch guard, mutated only through [`Action`]s.
//! Mutations patch the cached lists in place instead of triggering a refetch.

use chrono::{DateTime, FixedOffset, Utc};

use crate::calendar::is_same_home_day;
use crate::domain::{
    Advice, Article, CareerGoal, ChatMessage, Initiative, Quest, Routine, User,
    UserStatus, DEFAULT_AGENT,
};

pub const SIGN_IN_ROUTE: &str = "/signin";
pub const HOME_ROUTE: &str = "/";
pub const TUTORIAL_ROUTE: &str = "/tutorial";

/// A cached value plus its "has this been fetched yet" flag.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Slot<T> {
    pub value: T,
    pub fetched: bool,
}

impl<T: Default> Slot<T> {
    fn fill(&mut self, value: T) {
        self.value = value;
        self.fetched = true;
    }
}

/// Collections guarded by a fetch flag.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Collection {
    Quests,
    Routines,
    CareerGoals,
    Initiatives,
    Articles,
    Advice,
}

#[derive(Debug, Clone)]
pub enum Action {
    SignedIn { user_id: String },
    SessionStarted { session_id: String },
    UserChanged(User),
    ChatHistoryChanged(Vec<ChatMessage>),
    AgentSelected(String),

    QuestsFetched(Vec<Quest>),
    QuestAdded(Quest),
    QuestCompletionSet { id: String, completed: bool },
    QuestRemoved { id: String },
    QuestPromoted { quest_id: String, routine: Routine },

    RoutinesFetched(Vec<Routine>),
    RoutineAdded(Routine),
    RoutineCompletionSet { id: String, completed: bool, streak: i32 },
    RoutineRemoved { id: String },

    CareerGoalsFetched(Vec<CareerGoal>),
    CareerGoalsAdded(Vec<CareerGoal>),
    CareerGoalRemoved { id: String },

    InitiativesFetched(Vec<Initiative>),
    InitiativesAdded(Vec<Initiative>),
    InitiativeRemoved { id: String },

    ArticlesFetched(Vec<Article>),
    ArticleFavoriteSet { id: String, favorite: bool },

    AdviceFetched(Option<Advice>),

    /// Forces the next `needs_fetch` for this collection to return true.
    Invalidate(Collection),
    SignedOut,
}

#[derive(Debug, Clone, PartialEq)]
pub struct ClientState {
    pub user_id: Option<String>,
    pub user: Option<User>,
    pub session_id: Option<String>,
    pub chat_messages: Vec<ChatMessage>,
    pub agent: String,
    pub quests: Slot<Vec<Quest>>,
    pub routines: Slot<Vec<Routine>>,
    pub career_goals: Slot<Vec<CareerGoal>>,
    pub initiatives: Slot<Vec<Initiative>>,
    pub articles: Slot<Vec<Article>>,
    pub advice: Slot<Option<Advice>>,
}

impl Default for ClientState {
    fn default() -> Self {
        Self {
            user_id: None,
            user: None,
            session_id: None,
            chat_messages: Vec::new(),
            agent: DEFAULT_AGENT.to_string(),
            quests: Slot::default(),
            routines: Slot::default(),
            career_goals: Slot::default(),
            initiatives: Slot::default(),
            articles: Slot::default(),
            advice: Slot::default(),
        }
    }
}

impl ClientState {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn needs_fetch(&self, collection: Collection) -> bool {
        !match collection {
            Collection::Quests => self.quests.fetched,
            Collection::Routines => self.routines.fetched,
            Collection::CareerGoals => self.career_goals.fetched,
            Collection::Initiatives => self.initiatives.fetched,
            Collection::Articles => self.articles.fetched,
            Collection::Advice => self.advice.fetched,
        }
    }

    pub fn apply(&mut self, action: Action) {
        match action {
            Action::SignedIn { user_id } => self.user_id = Some(user_id),
            Action::SessionStarted { session_id } => self.session_id = Some(session_id),
            Action::UserChanged(user) => self.user = Some(user),
            Action::ChatHistoryChanged(messages) => self.chat_messages = messages,
            Action::AgentSelected(agent) => self.agent = agent,

            Action::QuestsFetched(quests) => self.quests.fill(quests),
            Action::QuestAdded(quest) => self.quests.value.insert(0, quest),
            Action::QuestCompletionSet { id, completed } => {
                if let Some(quest) = self.quests.value.iter_mut().find(|q| q.id == id) {
                    quest.completed = completed;
                }
            }
            Action::QuestRemoved { id } => self.quests.value.retain(|q| q.id != id),
            Action::QuestPromoted { quest_id, routine } => {
                self.quests.value.retain(|q| q.id != quest_id);
                self.routines.value.insert(0, routine);
            }

            Action::RoutinesFetched(routines) => self.routines.fill(routines),
            Action::RoutineAdded(routine) => self.routines.value.insert(0, routine),
            Action::RoutineCompletionSet {
                id,
                completed,
                streak,
            } => {
                if let Some(routine) = self.routines.value.iter_mut().find(|r| r.id == id) {
                    routine.completed = completed;
                    routine.streak = streak;
                }
            }
            Action::RoutineRemoved { id } => self.routines.value.retain(|r| r.id != id),

            Action::CareerGoalsFetched(goals) => self.career_goals.fill(goals),
            Action::CareerGoalsAdded(goals) => self.career_goals.value.extend(goals),
            Action::CareerGoalRemoved { id } => self.career_goals.value.retain(|g| g.id != id),

            Action::InitiativesFetched(initiatives) => self.initiatives.fill(initiatives),
            Action::InitiativesAdded(initiatives) => self.initiatives.value.extend(initiatives),
            Action::InitiativeRemoved { id } => self.initiatives.value.retain(|i| i.id != id),

            Action::ArticlesFetched(articles) => self.articles.fill(articles),
            Action::ArticleFavoriteSet { id, favorite } => {
                if let Some(article) = self.articles.value.iter_mut().find(|a| a.id == id) {
                    article.favorite = favorite;
                }
            }

            Action::AdviceFetched(advice) => self.advice.fill(advice),

            Action::Invalidate(collection) => match collection {
                Collection::Quests => self.quests.fetched = false,
                Collection::Routines => self.routines.fetched = false,
                Collection::CareerGoals => self.career_goals.fetched = false,
                Collection::Initiatives => self.initiatives.fetched = false,
                Collection::Articles => self.articles.fetched = false,
                Collection::Advice => self.advice.fetched = false,
            },
            Action::SignedOut => *self = Self::default(),
        }
    }

    /// Quests created on the current home-timezone calendar day.
    pub fn todays_quests(&self, now: DateTime<Utc>, offset: FixedOffset) -> Vec<&Quest> {
        self.quests
            .value
            .iter()
            .filter(|q| is_same_home_day(&q.created_at, &now, offset))
            .collect()
    }
}

/// Where the client must navigate given the observed user status, if anywhere.
pub fn guard_redirect(user: Option<&User>, path: &str) -> Option<&'static str> {
    match user.map(|u| u.status) {
        Some(UserStatus::WaitingForTutorial) if path != TUTORIAL_ROUTE => Some(TUTORIAL_ROUTE),
        _ => None,
    }
}
