use uuid::Uuid;
use wasm_bindgen_futures::spawn_local;
use web_sys::HtmlInputElement;
use yew::prelude::*;

use crate::services::{auth, ApiClient};
use garageinn_shared::{LoginResponse, UserSummary};

#[derive(Properties, PartialEq)]
pub struct LoginFormProps {
    pub on_login: Callback<LoginResponse>,
}

#[function_component(LoginForm)]
pub fn login_form(props: &LoginFormProps) -> Html {
    let email = use_state(String::new);
    let password = use_state(String::new);
    let error_message = use_state(|| None::<String>);
    let loading = use_state(|| false);

    let onsubmit = {
        let email = email.clone();
        let password = password.clone();
        let error_message = error_message.clone();
        let loading = loading.clone();
        let on_login = props.on_login.clone();

        Callback::from(move |e: SubmitEvent| {
            e.prevent_default();

            let email = (*email).clone();
            let password = (*password).clone();
            if email.is_empty() || password.is_empty() {
                error_message.set(Some("Please fill in all fields".to_string()));
                return;
            }

            loading.set(true);
            error_message.set(None);

            let error_message = error_message.clone();
            let loading = loading.clone();
            let on_login = on_login.clone();
            spawn_local(async move {
                match auth::login(email, password).await {
                    Ok(response) => {
                        loading.set(false);
                        on_login.emit(response);
                    }
                    Err(e) => {
                        loading.set(false);
                        error_message.set(Some(e.message));
                    }
                }
            });
        })
    };

    let email_oninput = {
        let email = email.clone();
        Callback::from(move |e: InputEvent| {
            let input: HtmlInputElement = e.target_unchecked_into();
            email.set(input.value());
        })
    };

    let password_oninput = {
        let password = password.clone();
        Callback::from(move |e: InputEvent| {
            let input: HtmlInputElement = e.target_unchecked_into();
            password.set(input.value());
        })
    };

    html! {
        <div class="min-h-screen flex items-center justify-center bg-gray-50 py-12 px-4 sm:px-6 lg:px-8">
            <div class="max-w-md w-full space-y-8">
                <div>
                    <h2 class="mt-6 text-center text-3xl font-extrabold text-gray-900">
                        {"Sign in to GarageInn"}
                    </h2>
                    <p class="mt-2 text-center text-sm text-gray-600">
                        {"Operations portal"}
                    </p>
                </div>

                <form class="mt-8 space-y-6" {onsubmit}>
                    <div class="rounded-md shadow-sm -space-y-px">
                        <div>
                            <label for="email-address" class="sr-only">{"Email address"}</label>
                            <input
                                id="email-address"
                                name="email"
                                type="email"
                                autocomplete="email"
                                required=true
                                class="appearance-none rounded-none relative block w-full px-3 py-2 border border-gray-300 placeholder-gray-500 text-gray-900 rounded-t-md focus:outline-none focus:ring-blue-500 focus:border-blue-500 focus:z-10 sm:text-sm"
                                placeholder="Email address"
                                value={(*email).clone()}
                                oninput={email_oninput}
                            />
                        </div>
                        <div>
                            <label for="password" class="sr-only">{"Password"}</label>
                            <input
                                id="password"
                                name="password"
                                type="password"
                                autocomplete="current-password"
                                required=true
                                class="appearance-none rounded-none relative block w-full px-3 py-2 border border-gray-300 placeholder-gray-500 text-gray-900 rounded-b-md focus:outline-none focus:ring-blue-500 focus:border-blue-500 focus:z-10 sm:text-sm"
                                placeholder="Password"
                                value={(*password).clone()}
                                oninput={password_oninput}
                            />
                        </div>
                    </div>

                    if let Some(error) = (*error_message).clone() {
                        <div class="bg-red-50 border border-red-200 text-red-700 px-4 py-3 rounded relative">
                            {error}
                        </div>
                    }

                    <div>
                        <button
                            type="submit"
                            disabled={*loading}
                            class="group relative w-full flex justify-center py-2 px-4 border border-transparent text-sm font-medium rounded-md text-white bg-blue-600 hover:bg-blue-700 focus:outline-none focus:ring-2 focus:ring-offset-2 focus:ring-blue-500 disabled:opacity-50 disabled:cursor-not-allowed"
                        >
                            if *loading {
                                {"Signing in..."}
                            } else {
                                {"Sign in"}
                            }
                        </button>
                    </div>
                </form>
            </div>
        </div>
    }
}

/// Auth state shared across the app.
///
/// `is_loading` stays true until a stored token has been checked against
/// `/auth/me`, so consumers never mistake "not yet known" for "signed out".
#[derive(Clone, Debug, PartialEq)]
pub struct AuthContext {
    pub user: Option<UserSummary>,
    pub impersonated_by: Option<Uuid>,
    pub is_loading: bool,
    pub login: Callback<LoginResponse>,
    /// Drops local auth state; the server session is ended by the caller.
    pub signed_out: Callback<()>,
}

impl AuthContext {
    pub fn user_id(&self) -> Option<String> {
        self.user.as_ref().map(|user| user.id.to_string())
    }
}

#[derive(Debug, Clone, PartialEq)]
struct AuthState {
    user: Option<UserSummary>,
    impersonated_by: Option<Uuid>,
    is_loading: bool,
}

impl AuthState {
    fn signed_out() -> Self {
        Self {
            user: None,
            impersonated_by: None,
            is_loading: false,
        }
    }
}

#[derive(Properties, PartialEq)]
pub struct AuthProviderProps {
    pub children: Children,
}

#[function_component(AuthProvider)]
pub fn auth_provider(props: &AuthProviderProps) -> Html {
    let auth_state = use_state(|| AuthState {
        user: None,
        impersonated_by: None,
        is_loading: ApiClient::get_auth_token().is_some(),
    });

    // Hydrate from the stored token once
    {
        let auth_state = auth_state.clone();
        use_effect_with((), move |_| {
            if let Some(token) = ApiClient::get_auth_token() {
                spawn_local(async move {
                    let result = auth::me().await;

                    // A sign-in that finished meanwhile wins
                    if ApiClient::get_auth_token().as_deref() != Some(token.as_str()) {
                        return;
                    }

                    match result {
                        Ok(current) => auth_state.set(AuthState {
                            user: Some(current.user),
                            impersonated_by: current.impersonated_by,
                            is_loading: false,
                        }),
                        Err(_) => {
                            ApiClient::clear_auth_token();
                            auth_state.set(AuthState::signed_out());
                        }
                    }
                });
            }
            || ()
        });
    }

    let login = {
        let auth_state = auth_state.clone();
        Callback::from(move |response: LoginResponse| {
            ApiClient::set_auth_token(&response.token);
            auth_state.set(AuthState {
                user: Some(response.user),
                impersonated_by: None,
                is_loading: false,
            });

            // The token alone does not say whether this is an impersonated session
            let auth_state = auth_state.clone();
            spawn_local(async move {
                if let Ok(current) = auth::me().await {
                    auth_state.set(AuthState {
                        user: Some(current.user),
                        impersonated_by: current.impersonated_by,
                        is_loading: false,
                    });
                }
            });
        })
    };

    let signed_out = {
        let auth_state = auth_state.clone();
        Callback::from(move |_| {
            ApiClient::clear_auth_token();
            auth_state.set(AuthState::signed_out());
        })
    };

    let context = AuthContext {
        user: auth_state.user.clone(),
        impersonated_by: auth_state.impersonated_by,
        is_loading: auth_state.is_loading,
        login,
        signed_out,
    };

    html! {
        <ContextProvider<AuthContext> {context}>
            {props.children.clone()}
        </ContextProvider<AuthContext>>
    }
}
