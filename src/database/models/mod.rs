pub mod category;
pub mod course;
pub mod document;
pub mod organization;
pub mod outline;
pub mod quiz;
pub mod subscription;
pub mod ticket;

pub use category::Category;
pub use course::{Course, CourseInput, CourseKind};
pub use document::{Document, NewDocument};
pub use organization::{Organization, UserRecord};
pub use outline::{NewOutlineNode, OutlineLevel, OutlineNode};
pub use quiz::{
    AnswerInput, AttemptStatus, ManualGrade, NewOption, NewQuestion, NewQuiz, Question, QuestionKind,
    QuestionOption, Quiz, QuizAnswer, QuizAttempt,
};
pub use subscription::{Subscription, SubscriptionStatus};
pub use ticket::{NewTicket, Ticket, TicketReply, TicketStatus};
