pub mod states;

pub use states::{
    SessionContext, SessionController, SessionInput, SessionOutput, SessionStateMachine,
    UserIntent,
};
