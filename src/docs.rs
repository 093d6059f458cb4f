use crate::api::department::*;
use crate::api::event::*;
use crate::api::leave_request::*;
use crate::api::user::*;
use crate::auth::handlers::*;
use crate::model::department::{Department, DepartmentInput};
use crate::model::event::{Event, EventInput, EventOccurrence, Frequency, Recurrence, Visibility};
use crate::model::leave_request::{
    LeaveDocument, LeaveRequest, LeaveStatus, LeaveType, LeaveWithOwner, TransitionOutcome,
};
use crate::model::role::Role;
use crate::model::user::{EmployeeBalance, UserResponse};
use crate::models::{LoginReqDto, TokenPair};
use utoipa::Modify;
use utoipa::openapi::security::{HttpAuthScheme, HttpBuilder, SecurityScheme};
use utoipa::{OpenApi, openapi};

#[derive(OpenApi)]
#[openapi(
    info(
        title = "Leave Desk API",
        version = "1.0.0",
        description = r#"
## Leave & Calendar Management

Employees request leave and keep a shared calendar. Admins review requests,
and approving paid leave draws down the employee's paid-leave balance.

### Key Features
- **Leave Requests**
  - Submit sick, paid, unpaid or study leave with document references
  - Approve, reject or reopen requests; paid leave is charged in business days
  - Withdraw a request while it is still pending
- **Calendar**
  - Personal, public and private events
  - Weekly, monthly and yearly series expanded into dated occurrences
- **Directory**
  - Users with roles and paid-leave allowances
  - Departments

### Security
Everything under `/api` requires a **JWT Bearer** access token from `/auth/login`.

### Errors
Failures are returned as `{"error": "<kind>", "message": "<text>"}`.
"#,
    ),
    paths(
        login,
        refresh_token,
        logout,

        create_leave,
        user_leaves,
        leave_list,
        update_status,
        delete_leave,

        create_event,
        list_events,
        events_on_date,
        delete_event,

        create_user,
        list_users,
        me,

        list_departments,
        create_department,
        update_department,
        delete_department
    ),
    components(
        schemas(
            LoginReqDto,
            TokenPair,
            CreateLeave,
            DocumentUpload,
            StatusUpdate,
            LeaveType,
            LeaveStatus,
            LeaveDocument,
            LeaveRequest,
            LeaveWithOwner,
            TransitionOutcome,
            EmployeeBalance,
            EventInput,
            Event,
            EventOccurrence,
            Visibility,
            Frequency,
            Recurrence,
            CreateUser,
            UserResponse,
            Role,
            Department,
            DepartmentInput
        )
    ),
    modifiers(&SecurityAddon),
    tags(
        (name = "Auth", description = "Login and token rotation"),
        (name = "Leave", description = "Leave request lifecycle"),
        (name = "Events", description = "Calendar events and occurrences"),
        (name = "Users", description = "User directory"),
        (name = "Departments", description = "Department directory"),
    )
)]
pub struct ApiDoc;

struct SecurityAddon;

impl Modify for SecurityAddon {
    fn modify(&self, openapi: &mut openapi::OpenApi) {
        let components = openapi.components.get_or_insert_with(Default::default);
        components.add_security_scheme(
            "bearer_auth",
            SecurityScheme::Http(
                HttpBuilder::new()
                    .scheme(HttpAuthScheme::Bearer)
                    .bearer_format("JWT")
                    .build(),
            ),
        );
    }
}
