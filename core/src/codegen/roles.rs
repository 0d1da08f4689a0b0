use crate::error::ConfigError;
use crate::idents::IdentTable;
use crate::models::{GeneratedModule, WalletConfig, ADMIN_ROLE_ID};

use super::{capitalize, sol_addr, sol_str, SOLIDITY_HEADER};

/// Emit the self-contained access-control module: one membership array per
/// enabled role, exclusive member-to-role assignment with swap-and-pop
/// removal, and a grant/revoke permission matrix.
pub fn generate_roles_module(
    config: &WalletConfig,
    idents: &IdentTable,
) -> Result<GeneratedModule, ConfigError> {
    let roles: Vec<_> = config.enabled_roles().collect();

    let mut src = String::new();
    src.push_str(SOLIDITY_HEADER);
    src.push_str("\ncontract WalletRoles {\n");
    src.push_str("    address public owner;\n\n");

    // Per-role membership storage. Order within an array is not significant;
    // removal swaps the tail in to keep arrays dense.
    for role in &roles {
        let array = idents
            .role_members_array(&role.id)
            .ok_or_else(|| ConfigError::UnknownRole(role.id.clone()))?;
        src.push_str(&format!("    address[] public {};\n", array));
    }

    src.push_str("\n    mapping(address => string) private memberRole;\n");
    src.push_str("    mapping(address => bool) private memberFlag;\n");
    src.push_str("    mapping(string => bool) private roleExists;\n");
    src.push_str("    mapping(string => uint8) private roleLevel;\n");
    src.push_str("    mapping(string => string) private roleDisplayName;\n");
    src.push_str("    mapping(string => mapping(string => bool)) private rolePermissions;\n");

    src.push_str("\n    event RoleAssigned(address indexed member, string roleId);\n");
    src.push_str("    event RoleRemoved(address indexed member, string roleId);\n");
    src.push_str("    event PermissionGranted(string roleId, string permission);\n");
    src.push_str("    event PermissionRevoked(string roleId, string permission);\n");

    // Constructor: register roles, seed the permission matrix, then seed the
    // initial member assignments from the configuration.
    src.push_str("\n    constructor() {\n");
    src.push_str("        owner = msg.sender;\n");
    for role in &roles {
        let id = sol_str(&role.id);
        src.push_str(&format!("        roleExists[\"{}\"] = true;\n", id));
        src.push_str(&format!(
            "        roleLevel[\"{}\"] = {};\n",
            id, role.level
        ));
        src.push_str(&format!(
            "        roleDisplayName[\"{}\"] = \"{}\";\n",
            id,
            sol_str(&role.display_name)
        ));
        for permission in &role.permissions {
            src.push_str(&format!(
                "        rolePermissions[\"{}\"][\"{}\"] = true;\n",
                id,
                permission.as_str()
            ));
        }
    }
    for member in &config.members {
        if config.role(&member.role_id).is_some_and(|r| r.enabled) {
            src.push_str(&format!(
                "        _seed({}, \"{}\");\n",
                sol_addr(&member.address),
                sol_str(&member.role_id)
            ));
        }
    }
    src.push_str("    }\n");

    src.push_str("\n    modifier onlyOwner() {\n");
    src.push_str("        require(msg.sender == owner, \"caller is not the owner\");\n");
    src.push_str("        _;\n    }\n");

    src.push_str("\n    modifier onlyWithPermission(string memory permission) {\n");
    src.push_str(
        "        require(rolePermissions[memberRole[msg.sender]][permission], \"caller lacks permission\");\n",
    );
    src.push_str("        _;\n    }\n");

    // assignRole: exclusive membership. A member already holding a role is
    // removed from the old array before joining the new one.
    src.push_str("\n    function assignRole(address member, string memory roleId) public onlyOwner {\n");
    src.push_str("        require(roleExists[roleId], \"unknown role\");\n");
    src.push_str(&format!(
        "        require(!_same(roleId, \"{}\"), \"cannot assign reserved admin role\");\n",
        ADMIN_ROLE_ID
    ));
    src.push_str("        if (memberFlag[member]) {\n");
    src.push_str("            _removeFromRole(member);\n");
    src.push_str("        }\n");
    src.push_str("        _addToRole(member, roleId);\n");
    src.push_str("        emit RoleAssigned(member, roleId);\n");
    src.push_str("    }\n");

    src.push_str("\n    function removeRole(address member) public onlyOwner {\n");
    src.push_str("        require(memberFlag[member], \"not a member\");\n");
    src.push_str(&format!(
        "        require(!_same(memberRole[member], \"{}\"), \"cannot remove admin role holder\");\n",
        ADMIN_ROLE_ID
    ));
    src.push_str("        string memory roleId = memberRole[member];\n");
    src.push_str("        _removeFromRole(member);\n");
    src.push_str("        emit RoleRemoved(member, roleId);\n");
    src.push_str("    }\n");

    src.push_str("\n    function grantPermission(string memory roleId, string memory permission) public onlyWithPermission(\"modify-permissions\") {\n");
    src.push_str("        require(roleExists[roleId], \"unknown role\");\n");
    src.push_str("        rolePermissions[roleId][permission] = true;\n");
    src.push_str("        emit PermissionGranted(roleId, permission);\n");
    src.push_str("    }\n");

    src.push_str("\n    function revokePermission(string memory roleId, string memory permission) public onlyWithPermission(\"modify-permissions\") {\n");
    src.push_str("        require(roleExists[roleId], \"unknown role\");\n");
    src.push_str("        rolePermissions[roleId][permission] = false;\n");
    src.push_str("        emit PermissionRevoked(roleId, permission);\n");
    src.push_str("    }\n");

    src.push_str("\n    function hasPermission(string memory roleId, string memory permission) public view returns (bool) {\n");
    src.push_str("        return rolePermissions[roleId][permission];\n");
    src.push_str("    }\n");

    src.push_str("\n    function getMemberRole(address member) public view returns (string memory) {\n");
    src.push_str("        return memberRole[member];\n");
    src.push_str("    }\n");

    src.push_str("\n    function isMember(address member) public view returns (bool) {\n");
    src.push_str("        return memberFlag[member];\n");
    src.push_str("    }\n");

    src.push_str("\n    function holdsRole(address member, string memory roleId) public view returns (bool) {\n");
    src.push_str("        return memberFlag[member] && _same(memberRole[member], roleId);\n");
    src.push_str("    }\n");

    src.push_str("\n    function holdsOrOutranks(address member, string memory roleId) public view returns (bool) {\n");
    src.push_str("        if (!memberFlag[member]) {\n");
    src.push_str("            return false;\n");
    src.push_str("        }\n");
    src.push_str("        string memory held = memberRole[member];\n");
    src.push_str("        return _same(held, roleId) || roleLevel[held] > roleLevel[roleId];\n");
    src.push_str("    }\n");

    src.push_str("\n    function getRoleMetadata(string memory roleId) public view returns (string memory displayName, uint8 level, bool exists) {\n");
    src.push_str("        return (roleDisplayName[roleId], roleLevel[roleId], roleExists[roleId]);\n");
    src.push_str("    }\n");

    src.push_str("\n    function roleLevelOf(string memory roleId) public view returns (uint8) {\n");
    src.push_str("        return roleLevel[roleId];\n");
    src.push_str("    }\n");

    src.push_str("\n    function outranks(string memory roleA, string memory roleB) public view returns (bool) {\n");
    src.push_str("        return roleLevel[roleA] > roleLevel[roleB];\n");
    src.push_str("    }\n");

    // Per-role read accessors.
    for role in &roles {
        let ident = idents.role(&role.id).unwrap_or(&role.id);
        let array = format!("{}Members", ident);
        let cap = capitalize(ident);
        src.push_str(&format!(
            "\n    function get{}Members() public view returns (address[] memory) {{\n",
            cap
        ));
        src.push_str(&format!("        return {};\n", array));
        src.push_str("    }\n");
        src.push_str(&format!(
            "\n    function get{}MemberCount() public view returns (uint256) {{\n",
            cap
        ));
        src.push_str(&format!("        return {}.length;\n", array));
        src.push_str("    }\n");
    }

    // Internal plumbing: the role-id dispatch chains over the per-role
    // arrays, and the dense swap-and-pop removal.
    src.push_str("\n    function _addToRole(address member, string memory roleId) private {\n");
    let mut first = true;
    for role in &roles {
        let array = idents.role_members_array(&role.id).unwrap_or_default();
        let keyword = if first { "if" } else { "} else if" };
        src.push_str(&format!(
            "        {} (_same(roleId, \"{}\")) {{\n",
            keyword,
            sol_str(&role.id)
        ));
        src.push_str(&format!("            {}.push(member);\n", array));
        first = false;
    }
    if !first {
        src.push_str("        }\n");
    }
    src.push_str("        memberRole[member] = roleId;\n");
    src.push_str("        memberFlag[member] = true;\n");
    src.push_str("    }\n");

    src.push_str("\n    function _removeFromRole(address member) private {\n");
    src.push_str("        string memory held = memberRole[member];\n");
    let mut first = true;
    for role in &roles {
        let array = idents.role_members_array(&role.id).unwrap_or_default();
        let keyword = if first { "if" } else { "} else if" };
        src.push_str(&format!(
            "        {} (_same(held, \"{}\")) {{\n",
            keyword,
            sol_str(&role.id)
        ));
        src.push_str(&format!("            _swapPop({}, member);\n", array));
        first = false;
    }
    if !first {
        src.push_str("        }\n");
    }
    src.push_str("        delete memberRole[member];\n");
    src.push_str("        memberFlag[member] = false;\n");
    src.push_str("    }\n");

    src.push_str("\n    function _seed(address member, string memory roleId) private {\n");
    src.push_str("        _addToRole(member, roleId);\n");
    src.push_str("        emit RoleAssigned(member, roleId);\n");
    src.push_str("    }\n");

    src.push_str("\n    function _swapPop(address[] storage arr, address member) private {\n");
    src.push_str("        for (uint256 i = 0; i < arr.length; i++) {\n");
    src.push_str("            if (arr[i] == member) {\n");
    src.push_str("                arr[i] = arr[arr.length - 1];\n");
    src.push_str("                arr.pop();\n");
    src.push_str("                break;\n");
    src.push_str("            }\n");
    src.push_str("        }\n");
    src.push_str("    }\n");

    src.push_str("\n    function _same(string memory a, string memory b) private pure returns (bool) {\n");
    src.push_str("        return keccak256(bytes(a)) == keccak256(bytes(b));\n");
    src.push_str("    }\n");

    src.push_str("}\n");

    Ok(GeneratedModule {
        logical_name: "WalletRoles".to_string(),
        description: format!(
            "Access control module for {} with {} role(s)",
            config.name,
            roles.len()
        ),
        source_text: src,
    })
}
