use yew::prelude::*;

use crate::components::{AuthContext, ImpersonationContext};

#[function_component(DashboardPage)]
pub fn dashboard_page() -> Html {
    let auth_ctx = use_context::<AuthContext>().expect("AuthContext not found");
    let impersonation = use_context::<ImpersonationContext>();

    let Some(user) = auth_ctx.user.clone() else {
        return html! {};
    };
    let viewing_as = impersonation.is_some_and(|ctx| ctx.state.is_impersonating);

    html! {
        <div class="p-6 space-y-6">
            <div>
                <h1 class="text-2xl font-bold text-white">{format!("Welcome, {}", user.name)}</h1>
                <p class="text-gray-400">{user.email.clone()}</p>
            </div>

            <div class="grid grid-cols-1 md:grid-cols-3 gap-4">
                <div class="bg-gray-800 rounded-lg p-4">
                    <p class="text-gray-400 text-sm">{"Role"}</p>
                    <p class="text-white text-lg font-semibold">{user.role.display_name()}</p>
                </div>
                <div class="bg-gray-800 rounded-lg p-4">
                    <p class="text-gray-400 text-sm">{"Department"}</p>
                    <p class="text-white text-lg font-semibold">
                        {user.department.clone().unwrap_or_else(|| "-".to_string())}
                    </p>
                </div>
                <div class="bg-gray-800 rounded-lg p-4">
                    <p class="text-gray-400 text-sm">{"Session"}</p>
                    <p class="text-white text-lg font-semibold">
                        if viewing_as { {"Impersonated"} } else { {"Personal"} }
                    </p>
                </div>
            </div>
        </div>
    }
}
