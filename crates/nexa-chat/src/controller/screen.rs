use crate::store::{Character, CharacterView, User};

/// Which screen the user asked for.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ViewState {
    #[default]
    Auth,
    Home,
    Chat,
    Create,
    Profile,
    Edit,
}

/// What is actually shown. `Chat` and `Edit` carry the resolved character.
#[derive(Debug, Clone, PartialEq)]
pub enum Screen {
    Auth { error: Option<String> },
    Home,
    Chat(CharacterView),
    Create,
    Profile,
    Edit(CharacterView),
}

/// Pure projection of controller state onto a screen.
pub fn project(
    view: ViewState,
    user: Option<&User>,
    selected: Option<&Character>,
    auth_error: Option<&str>,
) -> Screen {
    let Some(user) = user else {
        return Screen::Auth { error: auth_error.map(str::to_string) };
    };
    match (view, selected) {
        (ViewState::Auth, _) => Screen::Auth { error: auth_error.map(str::to_string) },
        (ViewState::Home, _) => Screen::Home,
        (ViewState::Create, _) => Screen::Create,
        (ViewState::Profile, _) => Screen::Profile,
        (ViewState::Chat, Some(character)) => Screen::Chat(character.view_for(Some(user))),
        (ViewState::Edit, Some(character)) => Screen::Edit(character.view_for(Some(user))),
        (ViewState::Chat | ViewState::Edit, None) => Screen::Home,
    }
}
