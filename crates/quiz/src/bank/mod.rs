mod import;
mod normalize;
mod record;
mod storage;
mod store;

pub use import::{import_question_files, load_question_file, ImportOutcome, ImportSummary};
pub use normalize::normalize;
pub use record::{Choice, QuestionKind, QuestionRecord};
pub use storage::{
    FileStorage, MemoryStorage, QuizStorage, StorageError, QUESTIONS_KEY, SCENE_KEY, THEME_KEY,
};
pub use store::{AppendOutcome, BankError, ChangeListener, ExportPayload, QuestionBank};
