diesel::table! {
	/// Table for tracked packages.
	package (id) {
		id -> BigInt,
		name -> VarChar,
		tracked -> Bool,
		blocked -> Bool,
		/// Resolution state against the latest repo generation.
		///
		/// Null until the package takes part in a repo generation run.
		resolved -> Nullable<Bool>,
		last_build_id -> Nullable<BigInt>,
		last_complete_build_id -> Nullable<BigInt>,
	}
}

diesel::table! {
	/// Table for build attempts.
	build (id) {
		id -> BigInt,
		package_id -> BigInt,
		/// Repo generation the build root was created from.
		///
		/// Backfilled once known.
		repo_id -> Nullable<BigInt>,
		epoch -> Nullable<Int4>,
		version -> VarChar,
		release -> VarChar,
		state -> Int2,
		deps_resolved -> Bool,
		deps_processed -> Bool,
	}
}

diesel::table! {
	/// Resolved dependencies of a package within one repo generation.
	///
	/// `(repo_id, package_id, name)` is unique.
	dependency (id) {
		id -> BigInt,
		repo_id -> BigInt,
		package_id -> BigInt,
		name -> VarChar,
		epoch -> Int4,
		version -> VarChar,
		release -> VarChar,
		arch -> VarChar,
		/// Requirement graph distance from the direct build requirements.
		///
		/// Null when the dependency is too far away.
		distance -> Nullable<Int4>,
	}
}

diesel::table! {
	/// Predicted dependency changes for the next build of a package.
	unapplied_change (id) {
		id -> BigInt,
		package_id -> BigInt,
		prev_build_id -> BigInt,
		dep_name -> VarChar,
		prev_epoch -> Nullable<Int4>,
		prev_version -> Nullable<VarChar>,
		prev_release -> Nullable<VarChar>,
		curr_epoch -> Nullable<Int4>,
		curr_version -> Nullable<VarChar>,
		curr_release -> Nullable<VarChar>,
		distance -> Nullable<Int4>,
	}
}

diesel::table! {
	/// Dependency changes realized by a completed build.
	applied_change (id) {
		id -> BigInt,
		build_id -> BigInt,
		prev_build_id -> BigInt,
		dep_name -> VarChar,
		prev_epoch -> Nullable<Int4>,
		prev_version -> Nullable<VarChar>,
		prev_release -> Nullable<VarChar>,
		curr_epoch -> Nullable<Int4>,
		curr_version -> Nullable<VarChar>,
		curr_release -> Nullable<VarChar>,
		distance -> Nullable<Int4>,
	}
}

diesel::table! {
	/// Processed repo generations.
	repo (repo_id) {
		/// Generation ID assigned by the build system.
		repo_id -> BigInt,
		base_resolved -> Bool,
	}
}

diesel::table! {
	resolution_problem (id) {
		id -> BigInt,
		package_id -> BigInt,
		repo_id -> BigInt,
		problem -> VarChar,
	}
}

diesel::table! {
	/// Problems of the base build group for a failed repo generation.
	buildroot_problem (id) {
		id -> BigInt,
		repo_id -> BigInt,
		problem -> VarChar,
	}
}

diesel::table! {
	/// Pending requests to process a repo generation.
	repo_generation_request (id) {
		id -> BigInt,
		repo_id -> BigInt,
	}
}

diesel::joinable!(build -> package (package_id));
diesel::joinable!(dependency -> package (package_id));
diesel::joinable!(unapplied_change -> package (package_id));
diesel::joinable!(applied_change -> build (build_id));
diesel::joinable!(resolution_problem -> package (package_id));

diesel::allow_tables_to_appear_in_same_query!(
	package,
	build,
	dependency,
	unapplied_change,
	applied_change,
	repo,
	resolution_problem,
	buildroot_problem,
	repo_generation_request,
);
