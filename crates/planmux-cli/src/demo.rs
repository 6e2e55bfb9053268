//! Built-in demo data: an auth chain, a dashboard chain and a lone
//! documentation task across three goals.

use planmux_core::{Goal, PlanRequest, Priority, Task};

pub fn demo_request() -> PlanRequest {
    PlanRequest::new(
        vec![
            Task::new("T1", "Setup auth module")
                .goal("G1")
                .priority(Priority::Major)
                .estimate_hours(8)
                .file("auth.py"),
            Task::new("T2", "Add login endpoint")
                .goal("G1")
                .estimate_hours(4)
                .depends_on("T1")
                .files(["auth.py", "routes.py"]),
            Task::new("T3", "Add logout endpoint")
                .goal("G1")
                .estimate_hours(2)
                .depends_on("T1")
                .files(["auth.py", "routes.py"]),
            Task::new("T4", "Create user dashboard")
                .goal("G2")
                .priority(Priority::Major)
                .estimate_hours(16)
                .file("dashboard.tsx"),
            Task::new("T5", "Add metrics charts")
                .goal("G2")
                .estimate_hours(8)
                .depends_on("T4")
                .files(["dashboard.tsx", "charts.tsx"]),
            Task::new("T6", "Write documentation")
                .goal("G3")
                .priority(Priority::Minor)
                .estimate_hours(4)
                .file("README.md"),
        ],
        vec![
            Goal::new("G1", "Authentication")
                .priority(3)
                .with_tasks(["T1", "T2", "T3"]),
            Goal::new("G2", "Dashboard")
                .priority(2)
                .with_tasks(["T4", "T5"]),
            Goal::new("G3", "Documentation")
                .priority(1)
                .with_tasks(["T6"]),
        ],
    )
    .max_parallel(5)
}
